//! Token-based dependency injection for Keystone
//!
//! Services are registered against typed [`Token`]s, the dependency graph is
//! validated once up front, and instances are then resolved according to
//! their [`ServiceLifecycle`]. Child scopes inherit their ancestors'
//! registrations and own their scoped instances; disposal cascades from a
//! container to its live scopes.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use keystone_di::{mark_as_api_safe, ServiceContainer, ServiceLifecycle, Token};
//!
//! let container = ServiceContainer::new();
//! let greeting = Token::<String>::new("Greeting");
//! let shout = mark_as_api_safe(Token::<String>::new("Shout"));
//!
//! container.register_instance(&greeting, "hello".to_string()).unwrap();
//! let dependency = greeting.clone();
//! container
//!     .register_factory(
//!         shout.token(),
//!         move |deps| Ok(Arc::new(deps.get(&dependency)?.to_uppercase())),
//!         ServiceLifecycle::Singleton,
//!         vec![greeting.key()],
//!     )
//!     .unwrap();
//!
//! container.validate().unwrap();
//! assert_eq!(container.resolve(&shout).as_str(), "HELLO");
//! ```

pub mod api_safe;
pub mod container;
mod disposal;
pub mod error;
pub mod injectable;
pub mod lifecycle;
pub mod provider;
pub mod registration;
mod registry;
mod resolver;
pub mod token;
pub mod tokens;
mod validation;

pub use api_safe::{is_api_safe, mark_as_api_safe, revoke_api_safe, ApiSafeToken};
pub use container::{ContainerHealth, ServiceContainer, ServiceContainerBuilder, ROOT_SCOPE_NAME};
pub use error::{ContainerError, ContainerErrorCode, PanicError, Result};
pub use injectable::{Dependencies, Disposable, Injectable};
pub use lifecycle::{ContainerValidationState, ServiceLifecycle};
pub use provider::{
    discovered_module_count, list_discovered_modules, register_discovered_modules,
    ServiceModule, ServiceProvider, ServiceProviderRegistry,
};
pub use registration::{RegistrationInfo, RegistrationKind};
pub use token::{Token, TokenKey};
pub use tokens::{KEYSTONE_CONFIG, METRICS_COLLECTOR};
