//! Diagnostic logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! embedding application's call. The `sifr` binary uses [`init`].

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter: `RUST_LOG` when set and valid, else the configured
/// directives, else `info`.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a formatted stderr subscriber. Safe to call more than once; only
/// the first call takes effect.
pub fn init(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
