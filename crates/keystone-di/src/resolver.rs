//! Depth-first resolution
//!
//! Dependencies are resolved before the constructor runs, in declaration
//! order. The per-call path of tokens under construction detects
//! re-entrancy. Aliases forward to their target without joining the path;
//! a separate hop set stops alias loops. No container lock is held while a
//! constructor runs.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::trace;

use crate::container::ContainerInner;
use crate::error::{ContainerError, PanicError, Result};
use crate::injectable::Dependencies;
use crate::lifecycle::ServiceLifecycle;
use crate::registration::{Constructed, ConstructorRegistration, Instance, ServiceRegistration};
use crate::token::TokenKey;

/// State carried through one top-level resolution
#[derive(Default)]
pub(crate) struct ResolutionContext {
    path: Vec<TokenKey>,
    alias_hops: HashSet<TokenKey>,
}

impl ResolutionContext {
    fn cycle_through(&self, key: &TokenKey) -> Option<Vec<TokenKey>> {
        let start = self.path.iter().position(|k| k == key)?;
        let mut path = self.path[start..].to_vec();
        path.push(key.clone());
        Some(path)
    }
}

impl ContainerInner {
    fn ensure_resolvable(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(self.disposed_error());
        }
        let state = *self.state.lock();
        if !state.accepts_resolutions() {
            return Err(ContainerError::NotValidated {
                scope: self.scope_name.clone(),
                state: state.to_string(),
            });
        }
        Ok(())
    }

    /// Resolve `key` as seen from this container
    pub(crate) fn resolve_instance(
        self: &Arc<Self>,
        key: &TokenKey,
        context: &mut ResolutionContext,
    ) -> Result<Instance> {
        self.ensure_resolvable()?;

        let (owner, registration) = self
            .find_registration(key)
            .ok_or_else(|| ContainerError::TokenNotRegistered { token: key.clone() })?;

        match registration {
            ServiceRegistration::Value { instance, .. } => Ok(instance),
            ServiceRegistration::Alias { target } => {
                if !context.alias_hops.insert(key.clone()) {
                    let mut path = context.path.clone();
                    path.push(key.clone());
                    return Err(ContainerError::CircularDependencyDetected { path });
                }
                trace!(alias = %key, target = %target, "Following alias");
                let result = self.resolve_instance(&target, context);
                context.alias_hops.remove(key);
                result
            }
            ServiceRegistration::Class(constructor) | ServiceRegistration::Factory(constructor) => {
                self.resolve_constructed(key, &owner, &constructor, context)
            }
        }
    }

    fn resolve_constructed(
        self: &Arc<Self>,
        key: &TokenKey,
        owner: &Arc<ContainerInner>,
        constructor: &ConstructorRegistration,
        context: &mut ResolutionContext,
    ) -> Result<Instance> {
        // Singletons live with their registration and see only what their
        // owner sees; scoped instances live with the requesting scope.
        let (cache, resolve_from) = match constructor.lifecycle {
            ServiceLifecycle::Singleton => (Some(owner), owner),
            ServiceLifecycle::Scoped => {
                if self.parent.is_none() {
                    return Err(ContainerError::ScopeRequired { token: key.clone() });
                }
                (Some(self), self)
            }
            ServiceLifecycle::Transient => (None, self),
        };

        if let Some(cache) = cache {
            let existing = cache.instances.lock().entries.get(key).cloned();
            if let Some(instance) = existing {
                return Ok(instance);
            }
        }

        if let Some(path) = context.cycle_through(key) {
            return Err(ContainerError::CircularDependencyDetected { path });
        }

        context.path.push(key.clone());
        let built = Self::construct(key, resolve_from, constructor, context);
        context.path.pop();
        let Constructed { instance, disposer } = built?;

        let Some(cache) = cache else {
            return Ok(instance);
        };

        let mut instances = cache.instances.lock();
        if let Some(existing) = instances.entries.get(key) {
            return Ok(Arc::clone(existing));
        }
        instances.entries.insert(key.clone(), Arc::clone(&instance));
        if let Some(disposer) = disposer {
            instances.disposers.push((key.clone(), disposer));
        }
        trace!(
            scope = %cache.scope_name,
            token = %key,
            lifecycle = %constructor.lifecycle,
            "Cached instance"
        );
        Ok(instance)
    }

    fn construct(
        key: &TokenKey,
        resolve_from: &Arc<ContainerInner>,
        constructor: &ConstructorRegistration,
        context: &mut ResolutionContext,
    ) -> Result<Constructed> {
        let mut resolved = Vec::with_capacity(constructor.dependencies.len());
        for dependency in &constructor.dependencies {
            let instance = resolve_from.resolve_instance(dependency, context)?;
            resolved.push((dependency.clone(), instance));
        }

        let dependencies = Dependencies::new(key.clone(), resolved);
        let construct = Arc::clone(&constructor.construct);

        match catch_unwind(AssertUnwindSafe(|| construct(&dependencies))) {
            Ok(Ok(constructed)) => Ok(constructed),
            Ok(Err(source)) => Err(ContainerError::FactoryFailed {
                token: key.clone(),
                source,
            }),
            Err(payload) => Err(ContainerError::FactoryFailed {
                token: key.clone(),
                source: Box::new(PanicError::from_payload(payload)),
            }),
        }
    }
}
