//! Shared building blocks for keystone crates
//!
//! This crate has no dependencies on other keystone crates, making it safe
//! for every crate in the workspace to depend on. It provides:
//!
//! - [`BoxError`], the error type accepted from user-supplied factories
//! - [`config`], the serde configuration model and its loader
//! - [`logging`], `tracing` subscriber initialization
//! - [`metrics`], the observability sink consulted by the container, the
//!   port selector and the cache service

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use crate::config::{CacheConfig, ConfigManager, ContainerConfig, KeystoneConfig, LoggingConfig};
pub use error::{error_chain, BoxError, ConfigError};
pub use metrics::{
    InMemoryMetricsCollector, MetricsCollector, MetricsSnapshot, NoopMetricsCollector,
};
