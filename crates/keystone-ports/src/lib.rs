//! Version-specific capability adapters
//!
//! Code depends on a capability trait (a *port*); the implementation for the
//! running host is chosen at startup by major version. Selection is exact:
//! an unknown version fails with the list of versions that do exist.
//!
//! ```rust
//! use std::sync::Arc;
//! use keystone_di::{ServiceContainer, ServiceLifecycle, Token};
//! use keystone_ports::{PortRegistry, PortSelector, StaticVersionDetector};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> &'static str;
//! }
//!
//! struct GreeterV13;
//! impl Greeter for GreeterV13 {
//!     fn greet(&self) -> &'static str { "hello from 13" }
//! }
//!
//! let container = ServiceContainer::new();
//! let v13 = Token::<dyn Greeter>::new("GreeterV13");
//! container
//!     .register_factory(&v13, |_| Ok(Arc::new(GreeterV13) as Arc<dyn Greeter>), ServiceLifecycle::Singleton, vec![])
//!     .unwrap();
//! container.validate().unwrap();
//!
//! let mut registry = PortRegistry::<dyn Greeter>::new("greeter");
//! registry.register(13, v13).unwrap();
//!
//! let selector = PortSelector::new(Arc::new(StaticVersionDetector::new(13)));
//! let greeter = selector.select_port(&container, &registry).unwrap();
//! assert_eq!(greeter.greet(), "hello from 13");
//! ```

pub mod error;
pub mod events;
pub mod registry;
pub mod selector;
pub mod service;
pub mod version;

pub use error::{PortError, Result, SharedError};
pub use events::{
    PortSelectionEvent, PortSelectionEventEmitter, PortSelectionObserver, SubscriptionId,
    TracingSelectionObserver,
};
pub use registry::{PortFactory, PortRegistry, PortSource};
pub use selector::PortSelector;
pub use service::{PortBackedService, PortState};
pub use version::{parse_major_version, FnVersionDetector, StaticVersionDetector, VersionDetector};
