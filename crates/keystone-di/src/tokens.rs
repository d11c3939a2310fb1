//! Tokens for the services every container can carry
//!
//! [`ServiceContainerBuilder::with_core_services`](crate::ServiceContainerBuilder::with_core_services)
//! registers both as values on the root container.

use keystone_common::{KeystoneConfig, MetricsCollector};
use once_cell::sync::Lazy;

use crate::token::Token;

/// Metrics sink shared by the container, port selection and caching
pub static METRICS_COLLECTOR: Lazy<Token<dyn MetricsCollector>> =
    Lazy::new(|| Token::new("MetricsCollector"));

/// Loaded runtime configuration
pub static KEYSTONE_CONFIG: Lazy<Token<KeystoneConfig>> =
    Lazy::new(|| Token::new("KeystoneConfig"));
