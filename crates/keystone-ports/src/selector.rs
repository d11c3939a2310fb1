//! Exact-version port selection
//!
//! Selection accepts only the implementation registered for exactly the
//! detected version. A missing version is a hard error naming what is
//! available; there is no fallback to a neighbouring version.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use keystone_common::{MetricsCollector, NoopMetricsCollector};
use keystone_di::ServiceContainer;
use tracing::debug;

use crate::error::{PortError, Result, SharedError};
use crate::events::{
    PortSelectionEvent, PortSelectionEventEmitter, PortSelectionObserver, SubscriptionId,
};
use crate::registry::{PortRegistry, PortSource};
use crate::version::VersionDetector;

/// Picks and builds the implementation of a port for the running host
pub struct PortSelector {
    detector: Arc<dyn VersionDetector>,
    events: PortSelectionEventEmitter,
    metrics: Arc<dyn MetricsCollector>,
}

impl PortSelector {
    /// Create a new selector using `detector` for the host version
    pub fn new(detector: Arc<dyn VersionDetector>) -> Self {
        Self {
            detector,
            events: PortSelectionEventEmitter::new(),
            metrics: Arc::new(NoopMetricsCollector),
        }
    }

    /// Report selections to `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Add an observer for every selection attempt
    pub fn with_observer(self, observer: Arc<dyn PortSelectionObserver>) -> Self {
        self.events.add_observer(observer);
        self
    }

    /// Event fan-out used by this selector
    pub fn events(&self) -> &PortSelectionEventEmitter {
        &self.events
    }

    /// Shorthand for `events().subscribe(..)`
    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PortSelectionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    /// Select using the detected host version
    pub fn select_port<T>(&self, container: &ServiceContainer, registry: &PortRegistry<T>) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let started = Instant::now();
        match self.detector.detect_version() {
            Ok(version) => self.select(container, registry, version, started),
            Err(cause) => {
                let err = PortError::PortSelectionFailed {
                    port: registry.name().to_string(),
                    requested: None,
                    available: registry.available_versions(),
                    reason: "could not determine host version".to_string(),
                    source: Some(Arc::new(cause)),
                };
                self.report_failure(registry, None, &err);
                Err(err)
            }
        }
    }

    /// Select the implementation registered for exactly `detected_version`
    pub fn select_port_from_tokens<T>(
        &self,
        container: &ServiceContainer,
        registry: &PortRegistry<T>,
        detected_version: u32,
    ) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.select(container, registry, detected_version, Instant::now())
    }

    fn select<T>(
        &self,
        container: &ServiceContainer,
        registry: &PortRegistry<T>,
        version: u32,
        started: Instant,
    ) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        match Self::build(container, registry, version) {
            Ok(port) => {
                let duration = started.elapsed();
                self.metrics.record_port_selection(Some(version), true);
                self.events.emit(&PortSelectionEvent::Success {
                    port: registry.name().to_string(),
                    detected_version: version,
                    selected_version: version,
                    duration,
                });
                debug!(port = %registry.name(), version, "Selected port implementation");
                Ok(port)
            }
            Err(err) => {
                self.report_failure(registry, Some(version), &err);
                Err(err)
            }
        }
    }

    fn build<T>(container: &ServiceContainer, registry: &PortRegistry<T>, version: u32) -> Result<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        if container.is_disposed() {
            return Err(PortError::Disposed {
                port: registry.name().to_string(),
            });
        }

        let source = registry.get(version).ok_or_else(|| PortError::PortNotFound {
            port: registry.name().to_string(),
            requested: version,
            available: registry.available_versions(),
        })?;

        let failed = |reason: String, source: Option<SharedError>| PortError::PortSelectionFailed {
            port: registry.name().to_string(),
            requested: Some(version),
            available: registry.available_versions(),
            reason,
            source,
        };

        match source {
            PortSource::Token(token) => container.resolve_with_error(token).map_err(|err| {
                failed(
                    format!("could not resolve {}", token.description()),
                    Some(Arc::new(err)),
                )
            }),
            PortSource::Factory(factory) => {
                match catch_unwind(AssertUnwindSafe(|| factory(container))) {
                    Ok(Ok(port)) => Ok(port),
                    Ok(Err(err)) => Err(failed("adapter factory failed".to_string(), Some(Arc::from(err)))),
                    Err(payload) => {
                        let message = payload
                            .downcast_ref::<&str>()
                            .map(|s| (*s).to_string())
                            .or_else(|| payload.downcast_ref::<String>().cloned())
                            .unwrap_or_else(|| "unknown panic payload".to_string());
                        Err(failed(format!("adapter factory panicked: {}", message), None))
                    }
                }
            }
        }
    }

    fn report_failure<T: ?Sized>(&self, registry: &PortRegistry<T>, version: Option<u32>, err: &PortError) {
        self.metrics.record_port_selection(version, false);
        self.events.emit(&PortSelectionEvent::Failure {
            port: registry.name().to_string(),
            detected_version: version,
            available_versions: registry.available_versions(),
            error: err.to_string(),
        });
    }
}

impl std::fmt::Debug for PortSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortSelector")
            .field("events", &self.events)
            .finish()
    }
}
