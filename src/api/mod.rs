//! Typed client for the INLEARN REST API.
//!
//! The stores talk to the server exclusively through the [`DiagnosticApi`]
//! and [`SimulationApi`] seams so they can be driven by programmed stubs
//! in tests; [`HttpApiClient`] is the production implementation.

mod http;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpApiClient;
pub use types::{
    ClientPersona, CompleteDiagnosticInput, CompleteDiagnosticOutput, ConversationPhase,
    DiagnosticStatusOutput, EndSimulationInput, EndSimulationOutput, Sentiment, SimulationAnalysisOutput,
    SimulationMessageInput, SimulationMessageOutput, SimulationOutcome, SkillLevel, SkillReport,
    SkillScores, StartSimulationInput, StartSimulationOutput, TriggerDiagnosticOutput, TriggerStatus,
};

/// Client-side API failures.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error {code}: {message}")]
    Status { code: u16, message: String },

    #[error("response decode error: {0}")]
    Decode(String),
}

/// Server operations backing the diagnostic assessment workflow.
#[async_trait]
pub trait DiagnosticApi: Send + Sync {
    async fn fetch_status(&self) -> Result<DiagnosticStatusOutput, ApiError>;

    async fn trigger(&self) -> Result<TriggerDiagnosticOutput, ApiError>;

    async fn complete(
        &self,
        input: CompleteDiagnosticInput,
    ) -> Result<CompleteDiagnosticOutput, ApiError>;
}

/// Server operations backing practice simulations.
#[async_trait]
pub trait SimulationApi: Send + Sync {
    async fn start(&self, input: StartSimulationInput) -> Result<StartSimulationOutput, ApiError>;

    async fn send_message(
        &self,
        session_id: &str,
        input: SimulationMessageInput,
    ) -> Result<SimulationMessageOutput, ApiError>;

    async fn end(
        &self,
        session_id: &str,
        input: EndSimulationInput,
    ) -> Result<EndSimulationOutput, ApiError>;

    async fn fetch_analysis(
        &self,
        session_id: &str,
        include_transcript: bool,
    ) -> Result<SimulationAnalysisOutput, ApiError>;
}
