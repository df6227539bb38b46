// Process setup for the ofstats binary
//
// Logging/tracing and the store-backed reconciler

use anyhow::{Context, Result};
use ofstats_config::{LogConfig, LogFormat, RuntimeConfig};
use ofstats_store::Reconciler;

/// Initialize tracing/logging from the `[log]` section.
///
/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already installed
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_writer(std::io::stderr)),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_writer(std::io::stderr)),
        ),
    };
}

/// Open the configured store and wrap it in a reconciler.
pub fn init_reconciler(config: &RuntimeConfig) -> Result<Reconciler> {
    let store =
        ofstats_store::initialize_store(&config.store).context("Failed to initialize store")?;
    Ok(Reconciler::new(store))
}
