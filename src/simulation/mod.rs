//! Client-side mirror of one practice conversation.
//!
//! Synchronized one-way from server responses, with an optimistic local
//! echo of the trainee's own messages. Holds no persisted state: a page
//! reload loses an in-progress simulation by design.

pub mod runner;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::api::types::{
    ClientPersona, ConversationPhase, EndSimulationOutput, Sentiment, SimulationAnalysisOutput,
    SimulationMessageOutput, SimulationOutcome, StartSimulationOutput,
};
use crate::telemetry::events::record_simulation_turn;

pub use runner::SimulationRunner;

/// Lifecycle of one simulation session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionStatus {
    #[default]
    Idle,
    Initializing,
    Ready,
    InProgress,
    Ending,
    Completed,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Initializing => "initializing",
            SessionStatus::Ready => "ready",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Ending => "ending",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Trainee,
    Client,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Trainee => "trainee",
            Speaker::Client => "client",
        }
    }
}

/// One turn of the conversation, in append order.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp_ms: i64,
    pub sentiment: Option<Sentiment>,
    pub detected_intent: Option<String>,
}

/// Complete read model of the session, cloned out for the UI.
#[derive(Debug, Clone, Default)]
pub struct SimulationSnapshot {
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub persona: Option<ClientPersona>,
    pub conversation_state: ConversationPhase,
    pub messages: Vec<ConversationTurn>,
    pub turn_number: u32,
    pub elapsed_time_seconds: u64,
    pub current_sentiment: Sentiment,
    pub hints: Vec<String>,
    pub outcome: Option<SimulationOutcome>,
    pub preliminary_score: Option<f32>,
    pub analysis: Option<SimulationAnalysisOutput>,
}

/// State container for one simulation conversation.
///
/// Turns are appended strictly in invocation order, never reordered or
/// deduplicated; two trainee messages without an intervening client
/// reply are both kept.
pub struct SimulationStore {
    state: Mutex<SimulationSnapshot>,
}

impl Default for SimulationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SimulationSnapshot::default()),
        }
    }

    /// Replaces any prior session wholesale and seeds the conversation
    /// with the client persona's opening turn. Not for mid-session use.
    pub fn initialize_session(&self, start: &StartSimulationOutput) {
        let mut state = self.lock_state();
        *state = SimulationSnapshot {
            session_id: Some(start.session_id.clone()),
            status: if start.ready {
                SessionStatus::Ready
            } else {
                SessionStatus::Initializing
            },
            persona: Some(start.persona.clone()),
            conversation_state: ConversationPhase::Opening,
            messages: vec![ConversationTurn {
                speaker: Speaker::Client,
                text: start.opening_message.clone(),
                timestamp_ms: now_epoch_ms(),
                sentiment: None,
                detected_intent: None,
            }],
            ..SimulationSnapshot::default()
        };
    }

    /// Appends the trainee's turn before the server round-trip
    /// completes. Optimistic: there is no rollback on server rejection;
    /// the caller owns its error UI and may `reset()`.
    pub fn add_trainee_message(&self, text: &str) {
        let mut state = self.lock_state();
        if state.status == SessionStatus::Completed {
            warn!(
                target: "simulation_store",
                "ignoring trainee message after completion"
            );
            return;
        }

        state.messages.push(ConversationTurn {
            speaker: Speaker::Trainee,
            text: text.to_string(),
            timestamp_ms: now_epoch_ms(),
            sentiment: None,
            detected_intent: None,
        });
        state.status = SessionStatus::InProgress;

        if let Some(session_id) = state.session_id.as_deref() {
            record_simulation_turn(session_id, Speaker::Trainee.as_str(), state.turn_number);
        }
    }

    /// Appends the server-returned persona turn and overwrites the
    /// authoritative counters. None of these values are computed locally.
    pub fn handle_client_response(&self, response: &SimulationMessageOutput) {
        let mut state = self.lock_state();
        if state.status == SessionStatus::Completed {
            warn!(
                target: "simulation_store",
                "ignoring client response after completion"
            );
            return;
        }

        state.messages.push(ConversationTurn {
            speaker: Speaker::Client,
            text: response.client_reply.clone(),
            timestamp_ms: now_epoch_ms(),
            sentiment: Some(response.sentiment),
            detected_intent: response.detected_intent.clone(),
        });
        state.current_sentiment = response.sentiment;
        state.conversation_state = response.conversation_state;
        state.turn_number = response.turn_number;
        state.elapsed_time_seconds = response.elapsed_time_seconds;
        state.hints = response.hints.clone();

        if let Some(session_id) = state.session_id.as_deref() {
            record_simulation_turn(session_id, Speaker::Client.as_str(), state.turn_number);
        }
    }

    /// Marks the end round-trip as in flight.
    pub fn mark_ending(&self) {
        let mut state = self.lock_state();
        if state.status == SessionStatus::Completed {
            return;
        }
        state.status = SessionStatus::Ending;
    }

    /// Marks the session as failed; the caller surfaces the error.
    pub fn mark_error(&self) {
        let mut state = self.lock_state();
        state.status = SessionStatus::Error;
    }

    /// Terminal transition: records the outcome and preliminary score.
    /// The message log is frozen afterwards; a new session requires
    /// `initialize_session` again.
    pub fn complete_simulation(&self, end: &EndSimulationOutput) {
        let mut state = self.lock_state();
        state.status = SessionStatus::Completed;
        state.conversation_state = ConversationPhase::Ended;
        state.outcome = Some(end.outcome);
        state.preliminary_score = Some(end.preliminary_score);
    }

    /// Attaches the post-hoc detailed analysis; may arrive after
    /// completion.
    pub fn set_analysis(&self, analysis: SimulationAnalysisOutput) {
        let mut state = self.lock_state();
        state.analysis = Some(analysis);
    }

    /// Returns to the initial empty snapshot.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        *state = SimulationSnapshot::default();
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        self.lock_state().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    fn lock_state(&self) -> MutexGuard<'_, SimulationSnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
