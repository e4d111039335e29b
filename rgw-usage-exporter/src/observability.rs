//! Tracing/logging initialization

use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initialize the global tracing subscriber from configuration.
///
/// `log_format = "json"` emits structured JSON lines; anything else falls
/// back to the human-readable formatter, matching the teacher's
/// dev/production split.
pub fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        log_level = %config.log_level,
        log_format = %config.log_format,
        "tracing initialized"
    );
}
