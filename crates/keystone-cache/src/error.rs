//! Cache-related error types
//!
//! Reads and writes never fail; a disabled cache degrades to misses and
//! no-ops. The only error surfaces from `get_or_set` when the caller's
//! factory fails.

use keystone_common::BoxError;
use thiserror::Error;

/// Cache operation errors
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Factory failed for cache key {key}")]
    FactoryFailed {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    /// Key the failing operation was for
    pub fn key(&self) -> &str {
        match self {
            CacheError::FactoryFailed { key, .. } => key,
        }
    }
}

/// Re-export commonly used Result type
pub type Result<T> = std::result::Result<T, CacheError>;
