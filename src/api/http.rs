//! `reqwest`-backed implementation of the API seams.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::ApiConfig;

use super::types::{
    CompleteDiagnosticInput, CompleteDiagnosticOutput, DiagnosticStatusOutput, EndSimulationInput,
    EndSimulationOutput, SimulationAnalysisOutput, SimulationMessageInput, SimulationMessageOutput,
    StartSimulationInput, StartSimulationOutput, TriggerDiagnosticOutput,
};
use super::{ApiError, DiagnosticApi, SimulationApi};

/// HTTP client for the INLEARN REST API.
pub struct HttpApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl HttpApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        debug!(target: "api_client", path, "GET");
        let request = self.authorize(self.http.get(self.url(path)));
        Self::read_response(request.send().await).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        debug!(target: "api_client", path, "POST");
        let request = self.authorize(self.http.post(self.url(path)).json(body));
        Self::read_response(request.send().await).await
    }

    async fn read_response<T: DeserializeOwned>(
        result: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, ApiError> {
        let response = result.map_err(|err| ApiError::Network(err.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                code: status.as_u16(),
                message: extract_server_message(&body, status),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Pulls the server-provided message out of an error body, falling back
/// to the HTTP status line when the body is not the usual JSON envelope.
fn extract_server_message(body: &str, status: reqwest::StatusCode) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .or_else(|| value.get("error"))
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected server response")
                .to_string()
        })
}

#[async_trait]
impl DiagnosticApi for HttpApiClient {
    async fn fetch_status(&self) -> Result<DiagnosticStatusOutput, ApiError> {
        self.get_json("diagnostic/status").await
    }

    async fn trigger(&self) -> Result<TriggerDiagnosticOutput, ApiError> {
        self.post_json("diagnostic/trigger", &serde_json::json!({})).await
    }

    async fn complete(
        &self,
        input: CompleteDiagnosticInput,
    ) -> Result<CompleteDiagnosticOutput, ApiError> {
        self.post_json("diagnostic/complete", &input).await
    }
}

#[async_trait]
impl SimulationApi for HttpApiClient {
    async fn start(&self, input: StartSimulationInput) -> Result<StartSimulationOutput, ApiError> {
        self.post_json("simulations/start", &input).await
    }

    async fn send_message(
        &self,
        session_id: &str,
        input: SimulationMessageInput,
    ) -> Result<SimulationMessageOutput, ApiError> {
        self.post_json(&format!("simulations/{session_id}/message"), &input)
            .await
    }

    async fn end(
        &self,
        session_id: &str,
        input: EndSimulationInput,
    ) -> Result<EndSimulationOutput, ApiError> {
        self.post_json(&format!("simulations/{session_id}/end"), &input)
            .await
    }

    async fn fetch_analysis(
        &self,
        session_id: &str,
        include_transcript: bool,
    ) -> Result<SimulationAnalysisOutput, ApiError> {
        self.get_json(&format!(
            "simulations/{session_id}/analysis?includeTranscript={include_transcript}"
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_extracted_from_json_envelope() {
        let message = extract_server_message(
            r#"{"message": "diagnostic session expired"}"#,
            reqwest::StatusCode::CONFLICT,
        );
        assert_eq!(message, "diagnostic session expired");
    }

    #[test]
    fn status_line_used_when_body_is_not_json() {
        let message = extract_server_message("<html>busy</html>", reqwest::StatusCode::BAD_GATEWAY);
        assert_eq!(message, "Bad Gateway");
    }

    #[test]
    fn base_url_join_tolerates_trailing_slash() {
        let client = HttpApiClient::new(ApiConfig {
            base_url: "http://localhost:9000/api/".into(),
            ..ApiConfig::default()
        })
        .expect("client should build");
        assert_eq!(client.url("diagnostic/status"), "http://localhost:9000/api/diagnostic/status");
    }
}
