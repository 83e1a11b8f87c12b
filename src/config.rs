//! Static configuration for the client core.

use std::time::Duration;

/// Connection settings for the INLEARN REST API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL the diagnostic and simulation endpoints hang off.
    pub base_url: String,
    /// Per-request deadline applied by the HTTP client.
    pub request_timeout: Duration,
    /// Bearer token attached to every request when present.
    pub bearer_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout: Duration::from_secs(15),
            bearer_token: None,
        }
    }
}

/// Tuning knobs for the playback arbiter.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// How long a clip may take to become playable before the load is
    /// treated as a failure.
    pub load_timeout: Duration,
    /// Whether hiding the page force-stops active playback.
    pub stop_when_hidden: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            load_timeout: Duration::from_secs(30),
            stop_when_hidden: true,
        }
    }
}
