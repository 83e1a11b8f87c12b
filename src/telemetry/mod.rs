//! Observability initialization.

use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

pub mod events;

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);
    let subscriber = Registry::default().with(env_filter).with(fmt_layer);

    tracing::subscriber::set_global_default(subscriber).expect("failed to set global subscriber");
}

/// Like [`init_tracing`], with an additional daily-rolling file layer.
pub fn init_tracing_with_file<P: AsRef<Path>>(directory: P) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false);
    let appender = tracing_appender::rolling::daily(directory.as_ref(), "inlearn-core.log");
    let file_layer = fmt::layer().with_ansi(false).with_writer(appender);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(file_layer);

    tracing::subscriber::set_global_default(subscriber).expect("failed to set global subscriber");
}
