//! Cascading disposal
//!
//! Disposal is best-effort: live child scopes go first, then this
//! container's cached instances in reverse construction order. Failures are
//! collected and reported together once everything has been attempted.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use keystone_common::error_chain;
use tracing::{debug, info, warn};

use crate::container::{ContainerInner, InstanceCache, ServiceContainer};
use crate::error::{ContainerError, PanicError, Result};
use crate::lifecycle::ContainerValidationState;

impl ContainerInner {
    /// Dispose this container and everything below it, returning the
    /// individual failures
    fn dispose_tree(self: &Arc<Self>) -> Result<Vec<ContainerError>> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Err(self.disposed_error());
        }

        let mut failures = Vec::new();

        let children: Vec<Arc<ContainerInner>> = {
            let mut children = self.children.lock();
            children.drain(..).filter_map(|weak| weak.upgrade()).collect()
        };
        for child in &children {
            match child.dispose_tree() {
                Ok(child_failures) => failures.extend(child_failures),
                // Already disposed on its own; nothing left to do
                Err(ContainerError::Disposed { .. }) => {}
                Err(other) => failures.push(other),
            }
        }

        let cache = std::mem::take(&mut *self.instances.lock());
        failures.extend(self.run_disposers(cache));

        if let Some(parent) = &self.parent {
            let me = Arc::as_ptr(self);
            parent
                .children
                .lock()
                .retain(|weak| weak.strong_count() > 0 && weak.as_ptr() != me);
        }

        self.registry.write().clear();
        *self.state.lock() = ContainerValidationState::Registering;

        Ok(failures)
    }

    fn run_disposers(&self, cache: InstanceCache) -> Vec<ContainerError> {
        let InstanceCache {
            entries,
            disposers,
        } = cache;
        let mut failures = Vec::new();

        for (token, disposer) in disposers.into_iter().rev() {
            let outcome = catch_unwind(AssertUnwindSafe(|| disposer()));
            let source = match outcome {
                Ok(Ok(())) => {
                    debug!(scope = %self.scope_name, token = %token, "Disposed instance");
                    continue;
                }
                Ok(Err(source)) => source,
                Err(payload) => Box::new(PanicError::from_payload(payload)),
            };

            let failure = ContainerError::DisposalFailed {
                scope: self.scope_name.clone(),
                token,
                source,
            };
            warn!(error = %error_chain(&failure), "Instance disposal failed");
            failures.push(failure);
        }

        drop(entries);
        failures
    }
}

impl ServiceContainer {
    /// Dispose child scopes, then this container's cached instances.
    ///
    /// Every disposer runs even when some fail; failures come back as
    /// [`ContainerError::PartialDisposal`]. Afterwards every operation on
    /// this container fails with [`ContainerError::Disposed`], including a
    /// second call to `dispose`.
    pub fn dispose(&self) -> Result<()> {
        let failures = self.inner.dispose_tree()?;

        if failures.is_empty() {
            info!(scope = %self.inner.scope_name, "Container disposed");
            Ok(())
        } else {
            warn!(
                scope = %self.inner.scope_name,
                failures = failures.len(),
                "Container disposed with failures"
            );
            Err(ContainerError::PartialDisposal { failures })
        }
    }

    /// Drop every registration and cached instance and return to the
    /// registering state.
    ///
    /// Cached instances are released without running their disposers. Fails
    /// while child scopes are alive, since they may still resolve through
    /// this container.
    pub fn clear(&self) -> Result<()> {
        if self.inner.is_disposed() {
            return Err(self.inner.disposed_error());
        }
        let live = self.live_scope_count();
        if live > 0 {
            return Err(ContainerError::invalid_operation(
                "clear",
                format!("container '{}' has {} live scope(s)", self.inner.scope_name, live),
            ));
        }

        self.inner.registry.write().clear();
        *self.inner.instances.lock() = InstanceCache::default();
        *self.inner.state.lock() = ContainerValidationState::Registering;

        info!(scope = %self.inner.scope_name, "Cleared all services from container");
        Ok(())
    }
}
