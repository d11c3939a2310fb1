//! Lazily selected, memoized ports
//!
//! A [`PortBackedService`] runs selection the first time its port is needed
//! and remembers the outcome:
//!
//! ```text
//! Unresolved ──▶ Resolving ──▶ Resolved   (cached)
//!                     └──────▶ Failed     (cached until dispose)
//! ```
//!
//! [`dispose`](PortBackedService::dispose) puts the service back into
//! `Unresolved` so the next call selects again, e.g. after a reload.

use std::fmt;
use std::sync::Arc;

use keystone_di::ServiceContainer;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortError, Result};
use crate::registry::PortRegistry;
use crate::selector::PortSelector;

/// Externally visible state of a [`PortBackedService`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

enum Slot<T: ?Sized> {
    Unresolved,
    Resolving,
    Resolved(Arc<T>),
    Failed(PortError),
}

impl<T: ?Sized> Slot<T> {
    fn state(&self) -> PortState {
        match self {
            Slot::Unresolved => PortState::Unresolved,
            Slot::Resolving => PortState::Resolving,
            Slot::Resolved(_) => PortState::Resolved,
            Slot::Failed(_) => PortState::Failed,
        }
    }
}

/// A capability whose implementation is chosen on first use
pub struct PortBackedService<T: ?Sized> {
    container: ServiceContainer,
    registry: Arc<PortRegistry<T>>,
    selector: Arc<PortSelector>,
    slot: Mutex<Slot<T>>,
}

impl<T> PortBackedService<T>
where
    T: ?Sized + Send + Sync + 'static,
{
    /// Create a new service; nothing is selected until [`port`](Self::port)
    pub fn new(
        container: ServiceContainer,
        registry: Arc<PortRegistry<T>>,
        selector: Arc<PortSelector>,
    ) -> Self {
        Self {
            container,
            registry,
            selector,
            slot: Mutex::new(Slot::Unresolved),
        }
    }

    /// Current state
    pub fn state(&self) -> PortState {
        self.slot.lock().state()
    }

    /// The selected port, running selection on first call.
    ///
    /// Later calls return the cached port or the cached failure without
    /// selecting again.
    pub fn port(&self) -> Result<Arc<T>> {
        {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Resolved(port) => return Ok(Arc::clone(port)),
                Slot::Failed(err) => return Err(err.clone()),
                Slot::Resolving => {
                    return Err(PortError::PortSelectionFailed {
                        port: self.registry.name().to_string(),
                        requested: None,
                        available: self.registry.available_versions(),
                        reason: "selection is already in progress".to_string(),
                        source: None,
                    });
                }
                Slot::Unresolved => *slot = Slot::Resolving,
            }
        }

        // Selection runs unlocked: adapter factories may call back into
        // this service's container.
        let outcome = self.selector.select_port(&self.container, &self.registry);

        let mut slot = self.slot.lock();
        // A dispose during selection wins; report the outcome but do not keep it
        if !matches!(*slot, Slot::Resolving) {
            return outcome;
        }
        *slot = match &outcome {
            Ok(port) => Slot::Resolved(Arc::clone(port)),
            Err(err) => Slot::Failed(err.clone()),
        };
        debug!(port = %self.registry.name(), state = ?slot.state(), "Port selection settled");
        outcome
    }

    /// Forget the selected port or failure
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Unresolved);
        debug!(
            port = %self.registry.name(),
            previous = ?previous.state(),
            "Port-backed service reset"
        );
    }
}

impl<T: ?Sized> fmt::Debug for PortBackedService<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortBackedService")
            .field("port", &self.registry.name())
            .field("state", &self.slot.lock().state())
            .finish()
    }
}
