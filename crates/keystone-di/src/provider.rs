//! Service providers and module discovery
//!
//! A [`ServiceProvider`] groups the registrations of one feature area. The
//! [`ServiceProviderRegistry`] runs providers in priority order, validates
//! the container and then gives each provider a chance to check what it
//! needs.
//!
//! Crates can also contribute registrations without being named by the
//! application, by submitting a [`ServiceModule`] through `inventory`:
//!
//! ```rust,ignore
//! use keystone_di::ServiceModule;
//!
//! inventory::submit! {
//!     ServiceModule::new("storage", register_storage_services)
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

use crate::container::ServiceContainer;
use crate::error::{ContainerError, Result};

// ============================================================================
// ServiceProvider Trait
// ============================================================================

/// Registers a group of related services with a container
pub trait ServiceProvider: Send + Sync {
    /// Name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Lower values register first. Default is 100.
    fn priority(&self) -> u32 {
        100
    }

    /// Register services with the container
    fn register(&self, container: &ServiceContainer) -> Result<()>;

    /// Check the validated container, e.g. that optional collaborators the
    /// provider relies on are present
    #[allow(unused_variables)]
    fn validate(&self, container: &ServiceContainer) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// ServiceProviderRegistry
// ============================================================================

/// Collects providers and applies them to a container
pub struct ServiceProviderRegistry {
    providers: Vec<Arc<dyn ServiceProvider>>,
}

impl ServiceProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Add a provider
    pub fn add<P: ServiceProvider + 'static>(&mut self, provider: P) -> &mut Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Add a shared provider
    pub fn add_boxed(&mut self, provider: Arc<dyn ServiceProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Add every [`ServiceModule`] linked into the binary
    pub fn add_discovered(&mut self) -> &mut Self {
        for module in inventory::iter::<ServiceModule>() {
            self.providers.push(Arc::new(DiscoveredModule(module)));
        }
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider names in insertion order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Register every provider, validate the container, then run each
    /// provider's own check.
    ///
    /// Providers with equal priority keep their insertion order. A failed
    /// graph validation is reported as [`ContainerError::ValidationFailed`].
    pub fn register_all(&self, container: &ServiceContainer) -> Result<()> {
        let mut sorted: Vec<_> = self.providers.iter().collect();
        sorted.sort_by_key(|p| p.priority());

        info!(
            scope = %container.scope_name(),
            providers = sorted.len(),
            "Registering service providers"
        );

        for provider in &sorted {
            debug!(
                provider = provider.name(),
                priority = provider.priority(),
                "Registering provider"
            );
            provider.register(container)?;
        }

        container
            .validate()
            .map_err(|errors| ContainerError::ValidationFailed { errors })?;

        for provider in &sorted {
            provider.validate(container)?;
        }

        info!(scope = %container.scope_name(), "All service providers registered");
        Ok(())
    }
}

impl Default for ServiceProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Inventory discovery
// ============================================================================

/// A registration function contributed by a linked crate
pub struct ServiceModule {
    /// Name of the feature area, e.g. "cache"
    pub name: &'static str,

    /// Registers the module's services
    pub register_fn: fn(&ServiceContainer) -> Result<()>,

    /// Lower values register first (default 100)
    pub priority: u32,
}

impl ServiceModule {
    /// Create a new module with default priority
    pub const fn new(name: &'static str, register_fn: fn(&ServiceContainer) -> Result<()>) -> Self {
        Self {
            name,
            register_fn,
            priority: 100,
        }
    }

    /// Create a new module with custom priority
    pub const fn with_priority(
        name: &'static str,
        register_fn: fn(&ServiceContainer) -> Result<()>,
        priority: u32,
    ) -> Self {
        Self {
            name,
            register_fn,
            priority,
        }
    }
}

inventory::collect!(ServiceModule);

struct DiscoveredModule(&'static ServiceModule);

impl ServiceProvider for DiscoveredModule {
    fn name(&self) -> &'static str {
        self.0.name
    }

    fn priority(&self) -> u32 {
        self.0.priority
    }

    fn register(&self, container: &ServiceContainer) -> Result<()> {
        (self.0.register_fn)(container)
    }
}

/// Run every discovered module against `container` in priority order.
///
/// The container is left unvalidated so the caller can add more
/// registrations first.
pub fn register_discovered_modules(container: &ServiceContainer) -> Result<()> {
    let mut modules: Vec<&ServiceModule> = inventory::iter::<ServiceModule>().collect();
    modules.sort_by_key(|m| m.priority);

    info!(modules = modules.len(), "Discovered service modules via inventory");

    for module in modules {
        debug!(module = module.name, priority = module.priority, "Registering module");
        (module.register_fn)(container)?;
    }
    Ok(())
}

/// Names of all discovered modules
pub fn list_discovered_modules() -> Vec<&'static str> {
    inventory::iter::<ServiceModule>().map(|m| m.name).collect()
}

/// Number of discovered modules
pub fn discovered_module_count() -> usize {
    inventory::iter::<ServiceModule>().count()
}
