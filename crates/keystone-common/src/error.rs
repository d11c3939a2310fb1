//! Error types shared across keystone crates

use thiserror::Error;

/// Boxed error returned by user-supplied factories, disposers and detectors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

/// Format an error together with its `source()` chain.
///
/// The chain is cut after a fixed depth so a self-referencing source cannot
/// loop forever.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    const MAX_DEPTH: usize = 10;

    let mut rendered = error.to_string();
    let mut current = error.source();
    let mut depth = 0;

    while let Some(source) = current {
        if depth >= MAX_DEPTH {
            break;
        }
        rendered.push_str(" Caused by: ");
        rendered.push_str(&source.to_string());
        current = source.source();
        depth += 1;
    }

    rendered
}
