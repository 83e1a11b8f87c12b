//! Diagnostic assessment workflow.
//!
//! Sequences a chat simulation and an optional voice simulation into a
//! single skill report. The store is a pure state container: it never
//! navigates; the presentation layer observes phase changes and routes
//! accordingly. The server is authoritative: on any disagreement the
//! local state is discarded and rebuilt from the server's answer.

mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::types::{CompleteDiagnosticInput, SkillReport, TriggerStatus};
use crate::api::{ApiError, DiagnosticApi};
use crate::persistence::{StateStore, DIAGNOSTIC_STATE_KEY};
use crate::telemetry::events::{record_assessment_phase_change, record_assessment_reconciled};

pub use state::{AssessmentPhase, AssessmentState, DiagnosticEvent, StartOutcome};

/// State machine for one trainee's diagnostic assessment.
pub struct DiagnosticStore {
    api: Arc<dyn DiagnosticApi>,
    storage: Arc<dyn StateStore>,
    state: Mutex<AssessmentState>,
    events: broadcast::Sender<DiagnosticEvent>,
    /// Bumped whenever local state is discarded or rebuilt; in-flight
    /// server responses carrying a stale value are dropped.
    request_generation: AtomicU64,
}

impl DiagnosticStore {
    /// Builds the store, rehydrating persisted state from `storage`.
    /// A missing or undecodable blob falls back to the empty state.
    pub fn new(api: Arc<dyn DiagnosticApi>, storage: Arc<dyn StateStore>) -> Self {
        let state = Self::rehydrate(storage.as_ref());
        let (events, _) = broadcast::channel(32);
        Self {
            api,
            storage,
            state: Mutex::new(state),
            events,
            request_generation: AtomicU64::new(0),
        }
    }

    fn rehydrate(storage: &dyn StateStore) -> AssessmentState {
        match storage.get(DIAGNOSTIC_STATE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str(&blob) {
                Ok(state) => state,
                Err(err) => {
                    warn!(
                        target: "diagnostic_store",
                        %err,
                        "discarding undecodable assessment blob"
                    );
                    AssessmentState::default()
                }
            },
            Ok(None) => AssessmentState::default(),
            Err(err) => {
                warn!(
                    target: "diagnostic_store",
                    %err,
                    "state storage unavailable; starting empty"
                );
                AssessmentState::default()
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> AssessmentState {
        self.lock_state().clone()
    }

    pub fn phase(&self) -> AssessmentPhase {
        self.lock_state().phase
    }

    pub fn assessment_required(&self) -> bool {
        self.lock_state().assessment_required
    }

    pub fn latest_report(&self) -> Option<SkillReport> {
        self.lock_state().latest_report.clone()
    }

    /// Passive refresh against the server's diagnostic gate.
    ///
    /// A required diagnostic unconditionally discards all local progress
    /// and emits `Invalidated`; otherwise the cached report is replaced
    /// wholesale from the server's answer. Transport failures are
    /// swallowed and logged; failing to refresh must not interrupt an
    /// in-progress flow.
    pub async fn check_and_set_status(&self) {
        let status = match self.api.fetch_status().await {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    target: "diagnostic_store",
                    %err,
                    "status refresh failed; keeping cached state"
                );
                return;
            }
        };

        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            let now = now_epoch_ms();

            if status.needs_diagnostic {
                let discarded = *state != AssessmentState::default();
                self.request_generation.fetch_add(1, Ordering::SeqCst);
                Self::transition(&mut state, AssessmentPhase::Idle, &mut pending);
                *state = AssessmentState {
                    assessment_required: true,
                    last_check_timestamp_ms: Some(now),
                    ..AssessmentState::default()
                };
                self.persist(&state);
                record_assessment_reconciled(true, discarded);
                pending.push(DiagnosticEvent::Invalidated);
            } else {
                state.assessment_required = false;
                state.latest_report = status.current_report.clone();
                state.last_check_timestamp_ms = Some(now);
                // A present report with a stale mid-flow phase would
                // resurface a "just completed" banner; normalize to Idle
                // without touching an actual Done.
                if state.latest_report.is_some() && state.phase != AssessmentPhase::Done {
                    Self::transition(&mut state, AssessmentPhase::Idle, &mut pending);
                }
                self.persist(&state);
                record_assessment_reconciled(false, false);
                pending.push(DiagnosticEvent::ReportRefreshed);
            }
        }
        self.emit_all(pending);
    }

    /// Asks the server to begin a new diagnostic attempt.
    ///
    /// `skipped_recent` produces no phase transition; the typed return
    /// lets callers distinguish it from "never started".
    pub async fn start_assessment(&self) -> Result<StartOutcome, ApiError> {
        let output = self.api.trigger().await?;

        match output.status {
            TriggerStatus::SkippedRecent => {
                info!(
                    target: "diagnostic_store",
                    "diagnostic not started; one ran too recently"
                );
                Ok(StartOutcome::SkippedRecent {
                    last_diagnostic_at_ms: output.last_diagnostic_at,
                })
            }
            TriggerStatus::Started => {
                let mut pending = Vec::new();
                {
                    let mut state = self.lock_state();
                    state.diagnostic_session_id = Some(output.diagnostic_session_id.clone());
                    state.chat_simulation_session_id = None;
                    state.voice_simulation_session_id = None;
                    state.skipped_voice = false;
                    Self::transition(&mut state, AssessmentPhase::ChatPending, &mut pending);
                    self.persist(&state);
                }
                self.emit_all(pending);
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Records the chat-stage simulation session and advances to
    /// `ChatComplete`.
    pub fn set_chat_complete(&self, session_id: &str) {
        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            state.chat_simulation_session_id = Some(session_id.to_string());
            Self::transition(&mut state, AssessmentPhase::ChatComplete, &mut pending);
            self.persist(&state);
        }
        self.emit_all(pending);
    }

    /// Enters the optional voice stage. Guarded: only meaningful from
    /// `ChatComplete`.
    pub fn begin_voice_stage(&self) {
        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            if state.phase != AssessmentPhase::ChatComplete {
                debug!(
                    target: "diagnostic_store",
                    phase = state.phase.as_str(),
                    "voice stage requested outside chat_complete"
                );
                return;
            }
            Self::transition(&mut state, AssessmentPhase::VoicePending, &mut pending);
            self.persist(&state);
        }
        self.emit_all(pending);
    }

    /// Records the voice-stage simulation session; stage 2 is done
    /// regardless of path taken.
    pub fn set_voice_complete(&self, session_id: &str) {
        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            state.voice_simulation_session_id = Some(session_id.to_string());
            state.skipped_voice = false;
            Self::transition(&mut state, AssessmentPhase::VoiceComplete, &mut pending);
            self.persist(&state);
        }
        self.emit_all(pending);
    }

    /// Bypasses the optional voice stage.
    pub fn skip_voice(&self) {
        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            state.voice_simulation_session_id = None;
            state.skipped_voice = true;
            Self::transition(&mut state, AssessmentPhase::VoiceComplete, &mut pending);
            self.persist(&state);
        }
        self.emit_all(pending);
    }

    /// Finalizes the attempt and stores the produced report.
    ///
    /// Without an active diagnostic session this is a guarded no-op
    /// returning `None`. On server failure the phase reverts to
    /// `VoiceComplete` so the caller can retry, and the error
    /// propagates. Responses that lost a generation race are discarded.
    pub async fn complete_assessment(&self) -> Result<Option<SkillReport>, ApiError> {
        let mut pending = Vec::new();
        let prepared = {
            let mut state = self.lock_state();
            match state.diagnostic_session_id.clone() {
                None => None,
                Some(diagnostic_session_id) => {
                    let generation = self.request_generation.load(Ordering::SeqCst);
                    Self::transition(&mut state, AssessmentPhase::Completing, &mut pending);
                    self.persist(&state);
                    Some((
                        CompleteDiagnosticInput {
                            diagnostic_session_id,
                            simulation_session_id: state.chat_simulation_session_id.clone(),
                        },
                        generation,
                    ))
                }
            }
        };
        self.emit_all(std::mem::take(&mut pending));

        let Some((input, generation)) = prepared else {
            debug!(
                target: "diagnostic_store",
                "completion requested without an active diagnostic session"
            );
            return Ok(None);
        };

        match self.api.complete(input).await {
            Ok(output) => {
                let applied = {
                    let mut state = self.lock_state();
                    if self.request_generation.load(Ordering::SeqCst) == generation {
                        Self::transition(&mut state, AssessmentPhase::Done, &mut pending);
                        state.latest_report = Some(output.report.clone());
                        state.assessment_required = false;
                        state.diagnostic_session_id = None;
                        self.persist(&state);
                        true
                    } else {
                        false
                    }
                };

                if applied {
                    pending.push(DiagnosticEvent::ReportRefreshed);
                    self.emit_all(pending);
                    Ok(Some(output.report))
                } else {
                    warn!(
                        target: "diagnostic_store",
                        "discarding superseded completion response"
                    );
                    Ok(None)
                }
            }
            Err(err) => {
                {
                    let mut state = self.lock_state();
                    if self.request_generation.load(Ordering::SeqCst) == generation {
                        Self::transition(&mut state, AssessmentPhase::VoiceComplete, &mut pending);
                        self.persist(&state);
                    }
                }
                self.emit_all(pending);
                Err(err)
            }
        }
    }

    /// Full return to the initial empty state; the logout path.
    pub fn reset(&self) {
        self.request_generation.fetch_add(1, Ordering::SeqCst);
        let mut pending = Vec::new();
        {
            let mut state = self.lock_state();
            Self::transition(&mut state, AssessmentPhase::Idle, &mut pending);
            *state = AssessmentState::default();
            self.persist(&state);
        }
        pending.push(DiagnosticEvent::Invalidated);
        self.emit_all(pending);
    }

    fn transition(
        state: &mut AssessmentState,
        to: AssessmentPhase,
        pending: &mut Vec<DiagnosticEvent>,
    ) {
        if state.phase == to {
            return;
        }
        record_assessment_phase_change(
            state.phase.as_str(),
            to.as_str(),
            state.diagnostic_session_id.as_deref(),
        );
        state.phase = to;
        pending.push(DiagnosticEvent::PhaseChanged(to));
    }

    fn persist(&self, state: &AssessmentState) {
        match serde_json::to_string(state) {
            Ok(blob) => {
                if let Err(err) = self.storage.put(DIAGNOSTIC_STATE_KEY, &blob) {
                    warn!(
                        target: "diagnostic_store",
                        %err,
                        "failed to persist assessment state"
                    );
                }
            }
            Err(err) => {
                warn!(
                    target: "diagnostic_store",
                    %err,
                    "failed to encode assessment state"
                );
            }
        }
    }

    fn emit_all(&self, pending: Vec<DiagnosticEvent>) {
        for event in pending {
            let _ = self.events.send(event);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, AssessmentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}
