//! The service container façade
//!
//! A [`ServiceContainer`] is a cheap, cloneable handle. Clones share the same
//! registry, instance cache and scope tree.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use keystone_common::{
    BoxError, ContainerConfig, KeystoneConfig, MetricsCollector, NoopMetricsCollector,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api_safe::{is_api_safe, ApiSafeToken};
use crate::error::{ContainerError, Result};
use crate::injectable::{Dependencies, Disposable, Injectable};
use crate::lifecycle::{ContainerValidationState, ServiceLifecycle};
use crate::registration::{
    is_callable_type, DisposeFn, Instance, RegistrationInfo, RegistrationKind, ServiceRegistration,
};
use crate::registry::ServiceRegistry;
use crate::resolver::ResolutionContext;
use crate::token::{Token, TokenKey};
use crate::tokens::{KEYSTONE_CONFIG, METRICS_COLLECTOR};
use crate::validation::DependencyGraphValidator;

/// Name given to containers built without an explicit name
pub const ROOT_SCOPE_NAME: &str = "root";

/// Memoized instances plus the disposers captured when they were built
#[derive(Default)]
pub(crate) struct InstanceCache {
    pub(crate) entries: HashMap<TokenKey, Instance>,
    pub(crate) disposers: Vec<(TokenKey, DisposeFn)>,
}

/// Shared state behind a [`ServiceContainer`] handle
pub(crate) struct ContainerInner {
    pub(crate) scope_name: String,
    /// Distance from the root container
    pub(crate) depth: usize,
    pub(crate) parent: Option<Arc<ContainerInner>>,
    pub(crate) registry: RwLock<ServiceRegistry>,
    pub(crate) state: Mutex<ContainerValidationState>,
    pub(crate) instances: Mutex<InstanceCache>,
    pub(crate) children: Mutex<Vec<Weak<ContainerInner>>>,
    pub(crate) disposed: AtomicBool,
    pub(crate) config: ContainerConfig,
    pub(crate) metrics: Arc<dyn MetricsCollector>,
}

impl ContainerInner {
    fn new(
        scope_name: String,
        parent: Option<Arc<ContainerInner>>,
        config: ContainerConfig,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        let depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        Self {
            scope_name,
            depth,
            parent,
            registry: RwLock::new(ServiceRegistry::new(config.max_registrations)),
            state: Mutex::new(ContainerValidationState::Registering),
            instances: Mutex::new(InstanceCache::default()),
            children: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
            config,
            metrics,
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn disposed_error(&self) -> ContainerError {
        ContainerError::Disposed {
            scope: self.scope_name.clone(),
        }
    }

    fn ensure_registering(&self, operation: &str) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let state = *self.state.lock();
        if !state.accepts_registrations() {
            return Err(ContainerError::invalid_operation(
                operation,
                format!("container '{}' is {}", self.scope_name, state),
            ));
        }
        Ok(())
    }

    /// Whether any ancestor registers `key`
    pub(crate) fn ancestor_has(&self, key: &TokenKey) -> bool {
        let mut current = self.parent.as_ref();
        while let Some(container) = current {
            if container.registry.read().contains(key) {
                return true;
            }
            current = container.parent.as_ref();
        }
        false
    }

    /// Find the registration for `key` on this container or the nearest
    /// ancestor, returning the owning container alongside it
    pub(crate) fn find_registration(
        self: &Arc<Self>,
        key: &TokenKey,
    ) -> Option<(Arc<ContainerInner>, ServiceRegistration)> {
        let mut current = Some(Arc::clone(self));
        while let Some(container) = current {
            let found = container.registry.read().get(key).cloned();
            if let Some(registration) = found {
                return Some((container, registration));
            }
            current = container.parent.clone();
        }
        None
    }

    fn live_children(&self) -> Vec<Arc<ContainerInner>> {
        let mut children = self.children.lock();
        children.retain(|weak| weak.strong_count() > 0);
        children.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Health snapshot of a container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHealth {
    pub scope: String,
    pub state: ContainerValidationState,
    pub registrations: usize,
    pub cached_instances: usize,
    pub live_scopes: usize,
    pub disposed: bool,
}

/// Dependency-injection container
#[derive(Clone)]
pub struct ServiceContainer {
    pub(crate) inner: Arc<ContainerInner>,
}

impl ServiceContainer {
    /// Create an empty root container with default configuration
    pub fn new() -> Self {
        Self::from_inner(ContainerInner::new(
            ROOT_SCOPE_NAME.to_string(),
            None,
            ContainerConfig::default(),
            Arc::new(NoopMetricsCollector),
        ))
    }

    /// Start configuring a root container
    pub fn builder() -> ServiceContainerBuilder {
        ServiceContainerBuilder::new()
    }

    fn from_inner(inner: ContainerInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    fn insert(&self, key: &TokenKey, registration: ServiceRegistration) -> Result<()> {
        self.inner.ensure_registering("register")?;
        if self.inner.ancestor_has(key) {
            return Err(ContainerError::TokenAlreadyRegistered { token: key.clone() });
        }

        let kind = registration.kind();
        self.inner
            .registry
            .write()
            .insert(&self.inner.scope_name, key.clone(), registration)?;

        debug!(
            scope = %self.inner.scope_name,
            token = %key,
            kind = ?kind,
            "Registered service"
        );
        Ok(())
    }

    /// Register an [`Injectable`] type under `token`
    pub fn register_class<C: Injectable>(
        &self,
        token: &Token<C>,
        lifecycle: ServiceLifecycle,
    ) -> Result<()> {
        self.insert(token.key_ref(), ServiceRegistration::class::<C>(lifecycle))
    }

    /// Register a factory that receives its declared dependencies
    pub fn register_factory<T, F>(
        &self,
        token: &Token<T>,
        factory: F,
        lifecycle: ServiceLifecycle,
        dependencies: Vec<TokenKey>,
    ) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Dependencies) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.insert(
            token.key_ref(),
            ServiceRegistration::factory(factory, lifecycle, dependencies),
        )
    }

    /// Register a factory whose instances are disposed with their container
    pub fn register_disposable_factory<T, F>(
        &self,
        token: &Token<T>,
        factory: F,
        lifecycle: ServiceLifecycle,
        dependencies: Vec<TokenKey>,
    ) -> Result<()>
    where
        T: ?Sized + Disposable + Send + Sync + 'static,
        F: Fn(&Dependencies) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.insert(
            token.key_ref(),
            ServiceRegistration::disposable_factory(factory, lifecycle, dependencies),
        )
    }

    /// Register a pre-built value. Values are implicitly singletons, are
    /// owned by the caller and are never disposed by the container.
    ///
    /// Callables (closures, function pointers, `dyn Fn*`) are rejected with
    /// [`ContainerError::InvalidValueRegistration`]; register them with
    /// [`register_factory`](Self::register_factory) instead.
    pub fn register_value<T>(&self, token: &Token<T>, value: Arc<T>) -> Result<()>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        if is_callable_type(type_name) {
            return Err(ContainerError::InvalidValueRegistration {
                token: token.key(),
                type_name,
            });
        }
        self.insert(token.key_ref(), ServiceRegistration::value(value))
    }

    /// Register an owned value, wrapping it in an `Arc`
    pub fn register_instance<T>(&self, token: &Token<T>, value: T) -> Result<()>
    where
        T: Send + Sync + 'static,
    {
        self.register_value(token, Arc::new(value))
    }

    /// Make `alias` resolve to whatever `target` resolves to
    pub fn register_alias<T: ?Sized>(&self, alias: &Token<T>, target: &Token<T>) -> Result<()> {
        if alias == target {
            return Err(ContainerError::invalid_operation(
                "register_alias",
                format!("alias {} cannot target itself", alias.description()),
            ));
        }
        self.insert(
            alias.key_ref(),
            ServiceRegistration::Alias {
                target: target.key(),
            },
        )
    }

    /// Read a value registration without requiring validation.
    ///
    /// Bootstrap code uses this to read configuration values before the
    /// graph is frozen. Returns `None` for anything that is not a value.
    pub fn get_registered_value<T>(&self, token: &Token<T>) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.inner.find_registration(token.key_ref()) {
            Some((_, ServiceRegistration::Value { instance, .. })) => {
                instance.downcast_ref::<Arc<T>>().cloned()
            }
            _ => None,
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Validate the dependency graph and freeze registrations.
    ///
    /// On failure every problem is returned and the container goes back to
    /// accepting registrations. Validating an already validated container
    /// is a no-op.
    pub fn validate(&self) -> std::result::Result<(), Vec<ContainerError>> {
        if self.inner.is_disposed() {
            return Err(vec![self.inner.disposed_error()]);
        }

        {
            let mut state = self.inner.state.lock();
            match *state {
                ContainerValidationState::Validated => return Ok(()),
                ContainerValidationState::Validating => {
                    return Err(vec![ContainerError::invalid_operation(
                        "validate",
                        format!("container '{}' is already validating", self.inner.scope_name),
                    )]);
                }
                ContainerValidationState::Registering => {
                    *state = ContainerValidationState::Validating;
                }
            }
        }

        let errors = {
            let registry = self.inner.registry.read();
            let inner = &self.inner;
            let ancestor_has = |key: &TokenKey| inner.ancestor_has(key);
            DependencyGraphValidator::new(&registry, &ancestor_has).validate()
        };

        let mut state = self.inner.state.lock();
        if errors.is_empty() {
            *state = ContainerValidationState::Validated;
            info!(
                scope = %self.inner.scope_name,
                registrations = self.inner.registry.read().len(),
                "Container validated"
            );
            Ok(())
        } else {
            *state = ContainerValidationState::Registering;
            warn!(
                scope = %self.inner.scope_name,
                errors = errors.len(),
                "Container validation failed"
            );
            Err(errors)
        }
    }

    /// Current validation state
    pub fn validation_state(&self) -> ContainerValidationState {
        *self.inner.state.lock()
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Create a child scope. Legal only once this container is validated.
    ///
    /// The child is named `<parent>.<name>`, or `<parent>.scope-<uuid>` when
    /// no name is given. It starts in the registering state, can resolve
    /// everything its ancestors register and must be validated before use.
    /// Nesting deeper than `max_scope_depth` is rejected.
    pub fn create_scope(&self, name: Option<&str>) -> Result<ServiceContainer> {
        if self.inner.is_disposed() {
            return Err(self.inner.disposed_error());
        }
        let state = self.validation_state();
        if !state.accepts_resolutions() {
            return Err(ContainerError::NotValidated {
                scope: self.inner.scope_name.clone(),
                state: state.to_string(),
            });
        }
        let limit = self.inner.config.max_scope_depth;
        if self.inner.depth >= limit {
            warn!(scope = %self.inner.scope_name, limit, "Scope depth limit reached");
            return Err(ContainerError::MaxScopeDepthExceeded {
                scope: self.inner.scope_name.clone(),
                limit,
            });
        }

        let segment = match name {
            Some(name) if name.trim().is_empty() => {
                return Err(ContainerError::invalid_operation(
                    "create_scope",
                    "scope name must not be empty",
                ));
            }
            Some(name) => name.trim().to_string(),
            None => format!("scope-{}", uuid::Uuid::new_v4()),
        };
        let scope_name = format!("{}.{}", self.inner.scope_name, segment);

        let child = Arc::new(ContainerInner::new(
            scope_name,
            Some(Arc::clone(&self.inner)),
            self.inner.config.clone(),
            Arc::clone(&self.inner.metrics),
        ));

        {
            let mut children = self.inner.children.lock();
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child));
        }

        debug!(parent = %self.inner.scope_name, scope = %child.scope_name, "Created scope");
        Ok(ServiceContainer { inner: child })
    }

    /// Fully qualified scope name, e.g. `root.request`
    pub fn scope_name(&self) -> &str {
        &self.inner.scope_name
    }

    /// Nesting depth below the root; the root is 0
    pub fn scope_depth(&self) -> usize {
        self.inner.depth
    }

    /// Whether this container has no parent
    pub fn is_root(&self) -> bool {
        self.inner.parent.is_none()
    }

    /// Number of child scopes that are still alive
    pub fn live_scope_count(&self) -> usize {
        self.inner.live_children().len()
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Resolve a token, reporting failures as errors.
    ///
    /// This never panics, including when a factory panics.
    pub fn resolve_with_error<T>(&self, token: &Token<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let started = Instant::now();
        let mut context = ResolutionContext::default();

        let result = self
            .inner
            .resolve_instance(token.key_ref(), &mut context)
            .and_then(|instance| {
                instance
                    .downcast_ref::<Arc<T>>()
                    .cloned()
                    .ok_or_else(|| ContainerError::TypeMismatch {
                        token: token.key(),
                        expected: std::any::type_name::<T>(),
                    })
            });

        let elapsed = started.elapsed();
        self.inner
            .metrics
            .record_resolution(token.description(), elapsed, result.is_ok());

        match &result {
            Ok(_) => debug!(
                scope = %self.inner.scope_name,
                token = %token.description(),
                elapsed_us = elapsed.as_micros() as u64,
                "Resolved service"
            ),
            Err(err) => debug!(
                scope = %self.inner.scope_name,
                token = %token.description(),
                error = %err,
                "Resolution failed"
            ),
        }
        result
    }

    /// Resolve an API-safe token, reporting failures as errors
    pub fn try_resolve<T>(&self, token: &ApiSafeToken<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if !is_api_safe(token.key_ref()) {
            return Err(ContainerError::ApiBoundaryViolation { token: token.key() });
        }
        self.resolve_with_error(token.token())
    }

    /// Resolve an API-safe token.
    ///
    /// # Panics
    ///
    /// Panics with an "API boundary violation" message if the token's brand
    /// has been revoked, and with the container error message if resolution
    /// fails. Use [`resolve_with_error`](Self::resolve_with_error) or
    /// [`try_resolve`](Self::try_resolve) to handle failures as values.
    pub fn resolve<T>(&self, token: &ApiSafeToken<T>) -> Arc<T>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match self.try_resolve(token) {
            Ok(service) => service,
            Err(err) => panic!("{}", err),
        }
    }

    /// Whether `token` is registered here or on an ancestor
    pub fn is_registered<T: ?Sized>(&self, token: &Token<T>) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        self.inner.registry.read().contains(token.key_ref()) || self.inner.ancestor_has(token.key_ref())
    }

    /// Kind of registration held for `token`, looking through ancestors
    pub fn registration_kind<T: ?Sized>(&self, token: &Token<T>) -> Option<RegistrationKind> {
        self.inner
            .find_registration(token.key_ref())
            .map(|(_, registration)| registration.kind())
    }

    /// Number of registrations owned by this container (ancestors excluded)
    pub fn registered_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Describe this container's own registrations in registration order
    pub fn registrations(&self) -> Vec<RegistrationInfo> {
        self.inner
            .registry
            .read()
            .iter()
            .map(|(key, registration)| RegistrationInfo::describe(key, registration))
            .collect()
    }

    /// Whether [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Snapshot for health checks
    pub fn health(&self) -> ContainerHealth {
        ContainerHealth {
            scope: self.inner.scope_name.clone(),
            state: self.validation_state(),
            registrations: self.registered_count(),
            cached_instances: self.inner.instances.lock().entries.len(),
            live_scopes: self.live_scope_count(),
            disposed: self.is_disposed(),
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContainer")
            .field("scope", &self.inner.scope_name)
            .field("state", &self.validation_state())
            .field("registrations", &self.registered_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Builder pattern for configuring a root container
pub struct ServiceContainerBuilder {
    scope_name: String,
    config: ContainerConfig,
    metrics: Arc<dyn MetricsCollector>,
    core_services: Option<KeystoneConfig>,
}

impl ServiceContainerBuilder {
    /// Create a new container builder
    pub fn new() -> Self {
        Self {
            scope_name: ROOT_SCOPE_NAME.to_string(),
            config: ContainerConfig::default(),
            metrics: Arc::new(NoopMetricsCollector),
            core_services: None,
        }
    }

    /// Name of the root scope
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = name.into();
        self
    }

    /// Container limits
    pub fn config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// Metrics sink shared by the container and its scopes
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Pre-register the metrics sink under [`METRICS_COLLECTOR`] and the
    /// configuration under [`KEYSTONE_CONFIG`]. The container limits are
    /// taken from `config.container`.
    pub fn with_core_services(mut self, config: KeystoneConfig) -> Self {
        self.config = config.container.clone();
        self.core_services = Some(config);
        self
    }

    /// Build the container
    pub fn build(self) -> Result<ServiceContainer> {
        let container = ServiceContainer::from_inner(ContainerInner::new(
            self.scope_name,
            None,
            self.config,
            Arc::clone(&self.metrics),
        ));

        if let Some(config) = self.core_services {
            container.register_value(&*METRICS_COLLECTOR, self.metrics)?;
            container.register_instance(&*KEYSTONE_CONFIG, config)?;
            debug!(scope = %container.scope_name(), "Registered core services");
        }

        Ok(container)
    }
}

impl Default for ServiceContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
