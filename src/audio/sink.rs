use async_trait::async_trait;
use thiserror::Error;

use super::AudioClip;

/// Failures surfaced by an audio output backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("clip decode failed: {0}")]
    Decode(String),

    #[error("audio device unavailable: {0}")]
    Device(String),

    #[error("sink failure: {0}")]
    Other(String),
}

/// Host-provided audio output device.
///
/// The playback arbiter drives exactly one sink; the sink holds at most
/// one clip at a time and is fully released by [`AudioSink::stop`].
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Prepares the clip, resolving once it is playable.
    async fn load(&self, clip: &AudioClip) -> Result<(), SinkError>;

    /// Begins output of the loaded clip.
    async fn start(&self) -> Result<(), SinkError>;

    async fn pause(&self) -> Result<(), SinkError>;

    async fn resume(&self) -> Result<(), SinkError>;

    /// Full teardown: halt output, rewind, release the clip. Idempotent.
    async fn stop(&self) -> Result<(), SinkError>;
}

/// Sink for headless hosts: accepts every clip instantly, outputs nothing.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn load(&self, _clip: &AudioClip) -> Result<(), SinkError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn pause(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn resume(&self) -> Result<(), SinkError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
