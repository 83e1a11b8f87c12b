use serde::Serialize;
use tracing::{info, warn};

pub(crate) const TARGET: &str = "telemetry::session_flow";
pub(crate) const EVENT_PHASE_CHANGE: &str = "assessment_phase_change";
pub(crate) const EVENT_RECONCILED: &str = "assessment_reconciled";
pub(crate) const EVENT_PLAYBACK_FAILURE: &str = "playback_failure";
pub(crate) const EVENT_SIMULATION_TURN: &str = "simulation_turn";

#[derive(Debug, Serialize)]
pub struct AssessmentPhaseChangeEvent<'a> {
    pub from: &'static str,
    pub to: &'static str,
    pub diagnostic_session_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AssessmentReconciledEvent {
    pub needs_diagnostic: bool,
    pub discarded_local_progress: bool,
}

#[derive(Debug, Serialize)]
pub struct PlaybackFailureEvent<'a> {
    pub clip_id: &'a str,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SimulationTurnEvent<'a> {
    pub session_id: &'a str,
    pub speaker: &'static str,
    pub turn_number: u32,
}

pub fn record_assessment_phase_change(
    from: &'static str,
    to: &'static str,
    diagnostic_session_id: Option<&str>,
) {
    let event = AssessmentPhaseChangeEvent {
        from,
        to,
        diagnostic_session_id,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_PHASE_CHANGE,
            from = event.from,
            to = event.to,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_PHASE_CHANGE,
            %err,
            "failed to encode phase change event"
        ),
    }
}

pub fn record_assessment_reconciled(needs_diagnostic: bool, discarded_local_progress: bool) {
    let event = AssessmentReconciledEvent {
        needs_diagnostic,
        discarded_local_progress,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_RECONCILED,
            needs_diagnostic = event.needs_diagnostic,
            discarded_local_progress = event.discarded_local_progress,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_RECONCILED,
            %err,
            "failed to encode reconciliation event"
        ),
    }
}

pub fn record_playback_failure(clip_id: &str, reason: String) {
    let event = PlaybackFailureEvent { clip_id, reason };

    match serde_json::to_string(&event) {
        Ok(payload) => warn!(
            target: TARGET,
            event = EVENT_PLAYBACK_FAILURE,
            clip_id = event.clip_id,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_PLAYBACK_FAILURE,
            %err,
            "failed to encode playback failure event"
        ),
    }
}

pub fn record_simulation_turn(session_id: &str, speaker: &'static str, turn_number: u32) {
    let event = SimulationTurnEvent {
        session_id,
        speaker,
        turn_number,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_SIMULATION_TURN,
            session_id = event.session_id,
            speaker = event.speaker,
            turn_number = event.turn_number,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_SIMULATION_TURN,
            %err,
            "failed to encode simulation turn event"
        ),
    }
}
