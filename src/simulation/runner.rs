//! Drives one practice conversation end to end.
//!
//! Pairs the passive [`SimulationStore`] with the server seam and the
//! playback arbiter: trainee messages are echoed optimistically, the
//! server's persona reply is applied verbatim, and synthesized reply
//! audio goes through the shared [`PlaybackManager`] so voice turns
//! never overlap.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::types::{
    EndSimulationInput, EndSimulationOutput, SimulationMessageInput, StartSimulationInput,
};
use crate::api::{ApiError, SimulationApi};
use crate::audio::{AudioClip, PlaybackManager};

use super::SimulationStore;

/// Coordinator for one simulation conversation.
pub struct SimulationRunner {
    api: Arc<dyn SimulationApi>,
    playback: Arc<PlaybackManager>,
    store: SimulationStore,
}

impl SimulationRunner {
    pub fn new(api: Arc<dyn SimulationApi>, playback: Arc<PlaybackManager>) -> Self {
        Self {
            api,
            playback,
            store: SimulationStore::new(),
        }
    }

    /// The store the presentation layer renders from.
    pub fn store(&self) -> &SimulationStore {
        &self.store
    }

    /// Starts a new session, replacing any prior one wholesale, and
    /// voices the persona's opening turn when audio is attached.
    pub async fn start(&self, input: StartSimulationInput) -> Result<(), ApiError> {
        let output = self.api.start(input).await?;
        self.store.initialize_session(&output);

        if let Some(encoded) = output.opening_audio_base64.as_deref() {
            self.play_turn_audio(&output.session_id, 0, encoded).await;
        }
        Ok(())
    }

    /// Sends the trainee's message. The local echo happens before the
    /// round-trip; on failure it stays in place and the error propagates
    /// for the caller's error UI.
    pub async fn send_trainee_message(
        &self,
        text: &str,
        message_type: &str,
    ) -> Result<(), ApiError> {
        let Some(session_id) = self.store.snapshot().session_id else {
            debug!(
                target: "simulation_runner",
                "message requested without an active session"
            );
            return Ok(());
        };

        self.store.add_trainee_message(text);

        let output = self
            .api
            .send_message(
                &session_id,
                SimulationMessageInput {
                    message: text.to_string(),
                    message_type: message_type.to_string(),
                },
            )
            .await?;
        self.store.handle_client_response(&output);

        if let Some(encoded) = output.audio_base64.as_deref() {
            self.play_turn_audio(&session_id, output.turn_number, encoded)
                .await;
        }
        Ok(())
    }

    /// Ends the session and records the server's verdict. A guarded
    /// no-op returning `None` without an active session.
    pub async fn end(&self, end_reason: &str) -> Result<Option<EndSimulationOutput>, ApiError> {
        let Some(session_id) = self.store.snapshot().session_id else {
            debug!(
                target: "simulation_runner",
                "end requested without an active session"
            );
            return Ok(None);
        };

        self.store.mark_ending();
        self.playback.stop().await;

        match self
            .api
            .end(
                &session_id,
                EndSimulationInput {
                    end_reason: end_reason.to_string(),
                },
            )
            .await
        {
            Ok(output) => {
                self.store.complete_simulation(&output);
                Ok(Some(output))
            }
            Err(err) => {
                self.store.mark_error();
                Err(err)
            }
        }
    }

    /// Fetches and attaches the post-hoc analysis; valid after
    /// completion.
    pub async fn load_analysis(&self, include_transcript: bool) -> Result<(), ApiError> {
        let Some(session_id) = self.store.snapshot().session_id else {
            debug!(
                target: "simulation_runner",
                "analysis requested without an active session"
            );
            return Ok(());
        };

        let analysis = self
            .api
            .fetch_analysis(&session_id, include_transcript)
            .await?;
        self.store.set_analysis(analysis);
        Ok(())
    }

    async fn play_turn_audio(&self, session_id: &str, turn_number: u32, encoded: &str) {
        let clip = match AudioClip::from_base64(encoded) {
            Ok(clip) => clip,
            Err(err) => {
                warn!(
                    target: "simulation_runner",
                    %err,
                    "dropping undecodable turn audio"
                );
                return;
            }
        };

        // Not-started outcomes (hidden page, supersession) are fine;
        // conversation flow never blocks on audio.
        let clip_id = format!("sim-{session_id}-turn-{turn_number}");
        self.playback.play(clip, Some(clip_id)).await;
    }
}
