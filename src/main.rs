use std::sync::Arc;

use anyhow::Result;

use inlearn_core::api::HttpApiClient;
use inlearn_core::audio::{NullSink, PlaybackManager};
use inlearn_core::config::{ApiConfig, PlaybackConfig};
use inlearn_core::diagnostic::DiagnosticStore;
use inlearn_core::persistence::{MemoryStateStore, StateStore};
use inlearn_core::persona::PersonaStore;
use inlearn_core::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut api_config = ApiConfig::default();
    if let Ok(base_url) = std::env::var("INLEARN_API_BASE_URL") {
        api_config.base_url = base_url;
    }
    if let Ok(token) = std::env::var("INLEARN_API_TOKEN") {
        api_config.bearer_token = Some(token);
    }

    let api = Arc::new(HttpApiClient::new(api_config)?);
    let storage: Arc<dyn StateStore> = Arc::new(MemoryStateStore::default());

    let diagnostics = DiagnosticStore::new(api, Arc::clone(&storage));
    let persona = Arc::new(PersonaStore::new(Arc::clone(&storage)));
    let _watcher = persona.watch_invalidation(diagnostics.subscribe());
    let _playback = PlaybackManager::new(Arc::new(NullSink), PlaybackConfig::default());

    diagnostics.check_and_set_status().await;
    tracing::info!(
        target: "client_core",
        phase = diagnostics.phase().as_str(),
        assessment_required = diagnostics.assessment_required(),
        "client core ready"
    );

    Ok(())
}
