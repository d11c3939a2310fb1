//! Port selection events
//!
//! Every selection attempt produces one [`PortSelectionEvent`]. Events fan
//! out to registered [`PortSelectionObserver`]s, to closure subscribers and
//! to a broadcast channel for async consumers. Delivery is a side effect:
//! a panicking observer is logged and skipped, and nothing a listener does
//! changes the selection result.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Channel capacity for broadcast events
const CHANNEL_CAPACITY: usize = 256;

/// Outcome of one selection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PortSelectionEvent {
    Success {
        port: String,
        detected_version: u32,
        selected_version: u32,
        duration: Duration,
    },
    Failure {
        port: String,
        /// `None` when the host version could not be detected
        detected_version: Option<u32>,
        available_versions: Vec<u32>,
        error: String,
    },
}

impl PortSelectionEvent {
    pub fn port(&self) -> &str {
        match self {
            PortSelectionEvent::Success { port, .. } | PortSelectionEvent::Failure { port, .. } => {
                port
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PortSelectionEvent::Success { .. })
    }
}

/// Receives selection events
pub trait PortSelectionObserver: Send + Sync {
    fn on_event(&self, event: &PortSelectionEvent);
}

/// Observer that writes each event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSelectionObserver;

impl PortSelectionObserver for TracingSelectionObserver {
    fn on_event(&self, event: &PortSelectionEvent) {
        match event {
            PortSelectionEvent::Success {
                port,
                detected_version,
                selected_version,
                duration,
            } => info!(
                port = %port,
                detected_version,
                selected_version,
                duration_us = duration.as_micros() as u64,
                "Port selected"
            ),
            PortSelectionEvent::Failure {
                port,
                detected_version,
                available_versions,
                error,
            } => warn!(
                port = %port,
                detected_version = ?detected_version,
                available_versions = ?available_versions,
                error = %error,
                "Port selection failed"
            ),
        }
    }
}

/// Handle returned by [`PortSelectionEventEmitter::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&PortSelectionEvent) + Send + Sync>;

/// Fan-out point for selection events
pub struct PortSelectionEventEmitter {
    observers: RwLock<Vec<Arc<dyn PortSelectionObserver>>>,
    callbacks: RwLock<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    sender: broadcast::Sender<PortSelectionEvent>,
}

impl PortSelectionEventEmitter {
    /// Create a new emitter with no listeners
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            observers: RwLock::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sender,
        }
    }

    /// Add a long-lived observer
    pub fn add_observer(&self, observer: Arc<dyn PortSelectionObserver>) {
        self.observers.write().push(observer);
    }

    /// Register a callback; keep the id to remove it later
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PortSelectionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.write();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    /// Receive future events on a broadcast channel
    pub fn receiver(&self) -> broadcast::Receiver<PortSelectionEvent> {
        self.sender.subscribe()
    }

    /// Observers plus callback subscribers
    pub fn listener_count(&self) -> usize {
        self.observers.read().len() + self.callbacks.read().len()
    }

    /// Deliver `event` to every listener
    pub fn emit(&self, event: &PortSelectionEvent) {
        // Snapshot so listeners may subscribe or unsubscribe while handling
        let observers: Vec<_> = self.observers.read().iter().cloned().collect();
        let callbacks: Vec<_> = self.callbacks.read().iter().map(|(_, cb)| Arc::clone(cb)).collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(event))).is_err() {
                warn!(port = %event.port(), "Port selection observer panicked");
            }
        }
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                warn!(port = %event.port(), "Port selection subscriber panicked");
            }
        }

        // No receivers is fine
        let _ = self.sender.send(event.clone());
    }
}

impl Default for PortSelectionEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PortSelectionEventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSelectionEventEmitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
