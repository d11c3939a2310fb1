//! Observability sink for resolutions, port selections and cache traffic
//!
//! The container, the port selector and the cache service report to a
//! [`MetricsCollector`] at well-defined points. What happens to those
//! reports is the collector's business: [`NoopMetricsCollector`] discards
//! them, [`InMemoryMetricsCollector`] keeps atomic counters that tests and
//! health checks can snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Sink for runtime events.
///
/// Every method has an empty default body so collectors only implement the
/// events they care about.
pub trait MetricsCollector: Send + Sync {
    /// A top-level resolution finished.
    #[allow(unused_variables)]
    fn record_resolution(&self, token: &str, duration: Duration, success: bool) {}

    /// A port selection attempt finished. `version` is `None` when the host
    /// version could not be detected.
    #[allow(unused_variables)]
    fn record_port_selection(&self, version: Option<u32>, success: bool) {}

    /// A cache read finished.
    #[allow(unused_variables)]
    fn record_cache_access(&self, hit: bool) {}

    /// A value was stored in the cache.
    fn record_cache_store(&self) {}

    /// An entry left the cache (expiry, LRU, explicit delete or invalidation).
    fn record_cache_eviction(&self) {}
}

/// Collector that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {}

/// Point-in-time copy of an [`InMemoryMetricsCollector`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful top-level resolutions
    pub resolutions: u64,
    /// Failed top-level resolutions
    pub resolution_failures: u64,
    /// Total time spent in top-level resolutions (microseconds)
    pub total_resolution_time_us: u64,
    /// Successful port selections
    pub port_selections: u64,
    /// Failed port selections
    pub port_selection_failures: u64,
    /// Failed port selections keyed by requested version (`"unknown"` when
    /// detection failed)
    pub port_failures_by_version: BTreeMap<String, u64>,
    /// Cache hits
    pub cache_hits: u64,
    /// Cache misses
    pub cache_misses: u64,
    /// Cache stores
    pub cache_stores: u64,
    /// Cache evictions
    pub cache_evictions: u64,
}

impl MetricsSnapshot {
    /// Cache hit rate as a percentage (0.0 to 100.0)
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }

    /// Average duration of a top-level resolution
    pub fn average_resolution_time(&self) -> Duration {
        let total = self.resolutions + self.resolution_failures;
        if total == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.total_resolution_time_us / total)
        }
    }
}

/// Thread-safe in-memory collector
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsCollector {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    resolutions: AtomicU64,
    resolution_failures: AtomicU64,
    total_resolution_time_us: AtomicU64,
    port_selections: AtomicU64,
    port_selection_failures: AtomicU64,
    port_failures_by_version: Mutex<BTreeMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_stores: AtomicU64,
    cache_evictions: AtomicU64,
}

impl InMemoryMetricsCollector {
    /// Create a collector with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current statistics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let c = &self.inner;
        MetricsSnapshot {
            resolutions: c.resolutions.load(Ordering::Relaxed),
            resolution_failures: c.resolution_failures.load(Ordering::Relaxed),
            total_resolution_time_us: c.total_resolution_time_us.load(Ordering::Relaxed),
            port_selections: c.port_selections.load(Ordering::Relaxed),
            port_selection_failures: c.port_selection_failures.load(Ordering::Relaxed),
            port_failures_by_version: c.port_failures_by_version.lock().clone(),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            cache_stores: c.cache_stores.load(Ordering::Relaxed),
            cache_evictions: c.cache_evictions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters
    pub fn reset(&self) {
        let c = &self.inner;
        c.resolutions.store(0, Ordering::Relaxed);
        c.resolution_failures.store(0, Ordering::Relaxed);
        c.total_resolution_time_us.store(0, Ordering::Relaxed);
        c.port_selections.store(0, Ordering::Relaxed);
        c.port_selection_failures.store(0, Ordering::Relaxed);
        c.port_failures_by_version.lock().clear();
        c.cache_hits.store(0, Ordering::Relaxed);
        c.cache_misses.store(0, Ordering::Relaxed);
        c.cache_stores.store(0, Ordering::Relaxed);
        c.cache_evictions.store(0, Ordering::Relaxed);
    }
}

impl MetricsCollector for InMemoryMetricsCollector {
    fn record_resolution(&self, _token: &str, duration: Duration, success: bool) {
        let c = &self.inner;
        if success {
            c.resolutions.fetch_add(1, Ordering::Relaxed);
        } else {
            c.resolution_failures.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        c.total_resolution_time_us.fetch_add(micros, Ordering::Relaxed);
    }

    fn record_port_selection(&self, version: Option<u32>, success: bool) {
        let c = &self.inner;
        if success {
            c.port_selections.fetch_add(1, Ordering::Relaxed);
            return;
        }
        c.port_selection_failures.fetch_add(1, Ordering::Relaxed);
        let key = version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        *c.port_failures_by_version.lock().entry(key).or_insert(0) += 1;
    }

    fn record_cache_access(&self, hit: bool) {
        if hit {
            self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_cache_store(&self) {
        self.inner.cache_stores.fetch_add(1, Ordering::Relaxed);
    }

    fn record_cache_eviction(&self) {
        self.inner.cache_evictions.fetch_add(1, Ordering::Relaxed);
    }
}
