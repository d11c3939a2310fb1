//! `tracing` subscriber initialization
//!
//! Library crates only emit events. Binaries and test harnesses call
//! [`init_logging`] once to install a formatter.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter for a logging configuration.
///
/// `RUST_LOG` wins over the configured level when it is set and valid.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install a global `fmt` subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed, which makes
/// repeated calls from tests harmless.
pub fn init_logging(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_target(config.with_target)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
