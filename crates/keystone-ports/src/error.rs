//! Port selection errors

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Cause attached to a failed selection. Shared so that a memoized failure
/// can be handed out more than once.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Result type for port operations
pub type Result<T> = std::result::Result<T, PortError>;

/// Errors raised while registering or selecting a port
#[derive(Debug, Clone, Error)]
pub enum PortError {
    #[error("Port '{port}' already has an implementation for version {version}")]
    DuplicateVersion { port: String, version: u32 },

    #[error("No implementation of port '{port}' for version {requested} (available: {})", format_versions(available))]
    PortNotFound {
        port: String,
        requested: u32,
        available: Vec<u32>,
    },

    #[error("Port selection for '{port}' failed (requested: {}, available: {}): {reason}", format_requested(*requested), format_versions(available))]
    PortSelectionFailed {
        port: String,
        requested: Option<u32>,
        available: Vec<u32>,
        reason: String,
        #[source]
        source: Option<SharedError>,
    },

    #[error("Version detection failed: {reason}")]
    VersionDetection { reason: String },

    #[error("Port '{port}' cannot be selected from a disposed container")]
    Disposed { port: String },
}

impl PortError {
    /// The version that was asked for, when known
    pub fn requested_version(&self) -> Option<u32> {
        match self {
            PortError::DuplicateVersion { version, .. } => Some(*version),
            PortError::PortNotFound { requested, .. } => Some(*requested),
            PortError::PortSelectionFailed { requested, .. } => *requested,
            PortError::VersionDetection { .. } | PortError::Disposed { .. } => None,
        }
    }

    /// Versions that were registered when the error was raised
    pub fn available_versions(&self) -> &[u32] {
        match self {
            PortError::PortNotFound { available, .. }
            | PortError::PortSelectionFailed { available, .. } => available,
            _ => &[],
        }
    }
}

pub(crate) fn format_versions(versions: &[u32]) -> String {
    if versions.is_empty() {
        return "none".to_string();
    }
    versions
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_requested(requested: Option<u32>) -> String {
    requested.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_versions() {
        let err = PortError::PortNotFound {
            port: "notifications".to_string(),
            requested: 99,
            available: vec![12, 13, 14],
        };
        assert_eq!(
            err.to_string(),
            "No implementation of port 'notifications' for version 99 (available: 12, 13, 14)"
        );
        assert_eq!(err.requested_version(), Some(99));
        assert_eq!(err.available_versions(), &[12, 13, 14]);
    }

    #[test]
    fn test_selection_failure_keeps_source() {
        let cause: SharedError = Arc::new(PortError::VersionDetection {
            reason: "no host".to_string(),
        });
        let err = PortError::PortSelectionFailed {
            port: "game".to_string(),
            requested: None,
            available: vec![],
            reason: "could not determine host version".to_string(),
            source: Some(cause),
        };

        assert!(err.to_string().contains("requested: unknown"));
        assert!(err.to_string().contains("available: none"));
        assert!(err.source().is_some());
        assert_eq!(err.requested_version(), None);
    }
}
