//! Assessment phases, persisted state, and workflow events.

use serde::{Deserialize, Serialize};

use crate::api::types::SkillReport;

/// Stage of the diagnostic assessment workflow.
///
/// Linear topology with one branch: `VoicePending` may be skipped by
/// going from `ChatComplete` straight to `VoiceComplete`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentPhase {
    #[default]
    Idle,
    ChatPending,
    ChatComplete,
    VoicePending,
    VoiceComplete,
    Completing,
    Done,
}

impl AssessmentPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentPhase::Idle => "idle",
            AssessmentPhase::ChatPending => "chat_pending",
            AssessmentPhase::ChatComplete => "chat_complete",
            AssessmentPhase::VoicePending => "voice_pending",
            AssessmentPhase::VoiceComplete => "voice_complete",
            AssessmentPhase::Completing => "completing",
            AssessmentPhase::Done => "done",
        }
    }
}

/// Persisted snapshot of the workflow, written through on every
/// transition and rehydrated once at startup.
///
/// The server remains the source of truth for whether a diagnostic is
/// required; this blob is only a resumable cache of in-progress
/// navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentState {
    pub phase: AssessmentPhase,
    /// Token grouping the chat and voice sub-sessions into one attempt;
    /// cleared on completion and reset.
    pub diagnostic_session_id: Option<String>,
    pub chat_simulation_session_id: Option<String>,
    pub voice_simulation_session_id: Option<String>,
    /// True when the optional voice stage was explicitly bypassed.
    pub skipped_voice: bool,
    pub assessment_required: bool,
    /// Overwritten wholesale on every successful fetch or completion.
    pub latest_report: Option<SkillReport>,
    /// Advisory freshness marker; gating decisions always re-query the
    /// server.
    pub last_check_timestamp_ms: Option<i64>,
}

/// Result of asking the server to begin a new diagnostic attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A diagnostic ran too recently. No phase transition occurred; the
    /// caller surfaces this as a non-fatal condition.
    SkippedRecent { last_diagnostic_at_ms: Option<i64> },
}

/// Workflow notifications for interested components. The persona store
/// subscribes to `Invalidated` instead of being reached into directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticEvent {
    PhaseChanged(AssessmentPhase),
    /// The server requires a new diagnostic; all local progress was
    /// discarded.
    Invalidated,
    ReportRefreshed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle_and_empty() {
        let state = AssessmentState::default();
        assert_eq!(state.phase, AssessmentPhase::Idle);
        assert!(state.diagnostic_session_id.is_none());
        assert!(!state.skipped_voice);
        assert!(!state.assessment_required);
        assert!(state.latest_report.is_none());
    }

    #[test]
    fn phase_serializes_snake_case() {
        let encoded = serde_json::to_string(&AssessmentPhase::VoiceComplete).expect("encode");
        assert_eq!(encoded, "\"voice_complete\"");

        let decoded: AssessmentPhase = serde_json::from_str("\"chat_pending\"").expect("decode");
        assert_eq!(decoded, AssessmentPhase::ChatPending);
    }

    #[test]
    fn state_blob_round_trips() {
        let state = AssessmentState {
            phase: AssessmentPhase::ChatComplete,
            diagnostic_session_id: Some("d1".into()),
            chat_simulation_session_id: Some("s1".into()),
            ..AssessmentState::default()
        };

        let blob = serde_json::to_string(&state).expect("encode");
        let decoded: AssessmentState = serde_json::from_str(&blob).expect("decode");
        assert_eq!(decoded, state);
    }
}
