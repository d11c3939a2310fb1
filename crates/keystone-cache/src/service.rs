//! In-memory TTL and LRU cache
//!
//! Entries expire lazily: an expired entry stays in the map until a read
//! touches it, at which point it is evicted and the read reports a miss.
//! When `max_entries` is set, storing a new key into a full cache evicts the
//! least recently accessed entry first.
//!
//! A disabled cache stores nothing and answers every read with a miss, so
//! callers never need a separate code path for "caching off".

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use keystone_common::{BoxError, CacheConfig, MetricsCollector, NoopMetricsCollector};
use keystone_di::Disposable;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};
use crate::key::CacheNamespace;

// ============================================================================
// Public types
// ============================================================================

/// Options for a single `set`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSetOptions {
    /// Overrides the configured default TTL; a zero TTL never expires
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

impl CacheSetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}

/// Bookkeeping kept next to every cached value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMetadata {
    pub key: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the entry never expires
    pub expires_at: Option<DateTime<Utc>>,
    pub last_accessed_at: DateTime<Utc>,
    pub hits: u64,
    /// De-duplicated, in first-seen order, case preserved
    pub tags: Vec<String>,
}

impl CacheEntryMetadata {
    /// Whether the entry is dead at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Exact, case-sensitive tag match
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Outcome of a cache read
#[derive(Debug, Clone)]
pub struct CacheLookup<T> {
    pub hit: bool,
    pub value: Option<Arc<T>>,
    pub metadata: Option<CacheEntryMetadata>,
}

impl<T> CacheLookup<T> {
    fn miss() -> Self {
        Self {
            hit: false,
            value: None,
            metadata: None,
        }
    }

    /// Drop the metadata and keep the value
    pub fn into_value(self) -> Option<Arc<T>> {
        self.value
    }
}

/// Counters for one cache instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub enabled: bool,
}

impl CacheStatistics {
    /// Hit rate as a percentage (0.0 to 100.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// Partial runtime reconfiguration; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheConfigUpdate {
    pub enabled: Option<bool>,
    pub default_ttl: Option<Duration>,
    /// `Some(None)` removes the size bound
    pub max_entries: Option<Option<usize>>,
}

// ============================================================================
// Storage
// ============================================================================

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    metadata: CacheEntryMetadata,
    access_seq: u64,
}

struct State {
    entries: HashMap<String, Entry>,
    enabled: bool,
    default_ttl: Duration,
    max_entries: Option<usize>,
    hits: u64,
    misses: u64,
    evictions: u64,
    next_seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Key of the entry with the oldest access, ties broken by access order
    fn lru_key(&self) -> Option<String> {
        self.entries
            .iter()
            .min_by_key(|(_, entry)| (entry.metadata.last_accessed_at, entry.access_seq))
            .map(|(key, _)| key.clone())
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !unique.contains(&tag) {
            unique.push(tag);
        }
    }
    unique
}

/// Expiry instant for an entry created at `created_at`. TTLs past the end of
/// the representable range saturate to [`DateTime::<Utc>::MAX_UTC`].
fn expiry(created_at: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    if ttl.is_zero() {
        return None;
    }
    let expires_at = TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| created_at.checked_add_signed(delta));
    match expires_at {
        Some(at) => Some(at),
        None => {
            warn!(ttl_secs = ttl.as_secs(), "Cache TTL out of range, saturating expiry");
            Some(DateTime::<Utc>::MAX_UTC)
        }
    }
}

/// A bound of zero cannot hold the entry being stored, so it is raised to one
fn effective_max_entries(max_entries: Option<usize>) -> Option<usize> {
    match max_entries {
        Some(0) => {
            warn!("Cache max_entries of 0 raised to 1");
            Some(1)
        }
        other => other,
    }
}

// ============================================================================
// CacheService
// ============================================================================

/// Namespaced key/value cache with TTL, LRU bound and tag invalidation
pub struct CacheService {
    namespace: String,
    state: Mutex<State>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsCollector>,
}

impl CacheService {
    /// Create a new cache using the system clock and no metrics sink
    pub fn new(config: CacheConfig) -> Self {
        CacheServiceBuilder::new().config(config).build()
    }

    pub fn builder() -> CacheServiceBuilder {
        CacheServiceBuilder::new()
    }

    /// Namespace from the configuration
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Key factory for `module_id` under this cache's namespace
    pub fn keys(&self, module_id: &str) -> CacheNamespace {
        CacheNamespace::new(&self.namespace, module_id)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Store `value` under `key`, replacing any previous entry
    pub fn set<T>(&self, key: &str, value: T, options: CacheSetOptions) -> CacheEntryMetadata
    where
        T: Send + Sync + 'static,
    {
        self.store(key, Arc::new(value), options)
    }

    /// Store an already shared value
    pub fn set_shared<T>(&self, key: &str, value: Arc<T>, options: CacheSetOptions) -> CacheEntryMetadata
    where
        T: Send + Sync + 'static,
    {
        self.store(key, value, options)
    }

    fn store(&self, key: &str, value: Arc<dyn Any + Send + Sync>, options: CacheSetOptions) -> CacheEntryMetadata {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let ttl = options.ttl.unwrap_or(state.default_ttl);
        let metadata = CacheEntryMetadata {
            key: key.to_string(),
            created_at: now,
            expires_at: expiry(now, ttl),
            last_accessed_at: now,
            hits: 0,
            tags: dedup_tags(options.tags),
        };

        if !state.enabled {
            return metadata;
        }

        let is_new = !state.entries.contains_key(key);
        let mut evicted = 0;
        if let Some(max) = state.max_entries {
            while is_new && state.entries.len() >= max {
                let Some(victim) = state.lru_key() else { break };
                state.entries.remove(&victim);
                state.evictions += 1;
                evicted += 1;
                debug!(key = %victim, "Evicted least recently used entry");
            }
        }

        let access_seq = state.next_seq();
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                metadata: metadata.clone(),
                access_seq,
            },
        );
        drop(state);

        for _ in 0..evicted {
            self.metrics.record_cache_eviction();
        }
        self.metrics.record_cache_store();
        metadata
    }

    /// Read `key`.
    ///
    /// A hit bumps the entry's hit count and last access time. An expired
    /// entry is evicted and reported as a miss, as is a value stored with a
    /// different type.
    pub fn get<T>(&self, key: &str) -> CacheLookup<T>
    where
        T: Send + Sync + 'static,
    {
        self.access(key, true)
    }

    /// Existence check. Records a hit or miss but leaves the entry's hit
    /// count and access time alone.
    pub fn has(&self, key: &str) -> bool {
        self.access::<()>(key, false).hit
    }

    fn access<T>(&self, key: &str, touch: bool) -> CacheLookup<T>
    where
        T: Send + Sync + 'static,
    {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if !state.enabled {
            return CacheLookup::miss();
        }

        let expired = state
            .entries
            .get(key)
            .is_some_and(|entry| entry.metadata.is_expired_at(now));
        if expired {
            state.entries.remove(key);
            state.evictions += 1;
            state.misses += 1;
            drop(state);
            debug!(key, "Evicted expired entry");
            self.metrics.record_cache_eviction();
            self.metrics.record_cache_access(false);
            return CacheLookup::miss();
        }

        let seq = state.next_seq();
        let lookup = match state.entries.get_mut(key) {
            Some(entry) if touch => match Arc::clone(&entry.value).downcast::<T>() {
                Ok(value) => {
                    entry.metadata.hits += 1;
                    entry.metadata.last_accessed_at = now;
                    entry.access_seq = seq;
                    Some(CacheLookup {
                        hit: true,
                        value: Some(value),
                        metadata: Some(entry.metadata.clone()),
                    })
                }
                Err(_) => None,
            },
            Some(entry) => Some(CacheLookup {
                hit: true,
                value: None,
                metadata: Some(entry.metadata.clone()),
            }),
            None => None,
        };

        let hit = lookup.is_some();
        if hit {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        drop(state);
        self.metrics.record_cache_access(hit);

        lookup.unwrap_or_else(CacheLookup::miss)
    }

    /// Return the cached value or build, store and return a fresh one.
    ///
    /// Concurrent calls for the same missing key each run their factory;
    /// the last one to finish wins the slot. A disabled cache runs the
    /// factory every time and stores nothing.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        factory: F,
        options: CacheSetOptions,
    ) -> Result<CacheLookup<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, BoxError>>,
    {
        let cached = self.get::<T>(key);
        if cached.hit {
            return Ok(cached);
        }

        let value = factory().await.map_err(|source| CacheError::FactoryFailed {
            key: key.to_string(),
            source,
        })?;
        Ok(self.fresh(key, value, options))
    }

    /// Synchronous form of [`get_or_set`](Self::get_or_set)
    pub fn get_or_set_with<T, F>(&self, key: &str, factory: F, options: CacheSetOptions) -> Result<CacheLookup<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> std::result::Result<T, BoxError>,
    {
        let cached = self.get::<T>(key);
        if cached.hit {
            return Ok(cached);
        }

        let value = factory().map_err(|source| CacheError::FactoryFailed {
            key: key.to_string(),
            source,
        })?;
        Ok(self.fresh(key, value, options))
    }

    fn fresh<T>(&self, key: &str, value: T, options: CacheSetOptions) -> CacheLookup<T>
    where
        T: Send + Sync + 'static,
    {
        let value = Arc::new(value);
        let metadata = self.store(key, Arc::clone(&value) as Arc<dyn Any + Send + Sync>, options);
        CacheLookup {
            hit: false,
            value: Some(value),
            metadata: Some(metadata),
        }
    }

    /// Remove `key`; returns whether an entry was removed
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        if !state.enabled {
            return false;
        }
        let removed = state.entries.remove(key).is_some();
        if removed {
            state.evictions += 1;
            drop(state);
            self.metrics.record_cache_eviction();
        }
        removed
    }

    /// Remove every entry; returns how many were removed
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        if !state.enabled {
            return 0;
        }
        let removed = Self::evict_all(&mut state);
        drop(state);
        self.record_evictions(removed);
        removed
    }

    fn evict_all(state: &mut State) -> usize {
        let removed = state.entries.len();
        state.entries.clear();
        state.evictions += removed as u64;
        removed
    }

    fn record_evictions(&self, count: usize) {
        for _ in 0..count {
            self.metrics.record_cache_eviction();
        }
    }

    /// Remove every entry whose metadata satisfies `predicate`; returns how
    /// many were removed
    pub fn invalidate_where<P>(&self, predicate: P) -> usize
    where
        P: Fn(&CacheEntryMetadata) -> bool,
    {
        let mut state = self.state.lock();
        if !state.enabled {
            return 0;
        }

        let before = state.entries.len();
        state.entries.retain(|_, entry| !predicate(&entry.metadata));
        let removed = before - state.entries.len();
        state.evictions += removed as u64;
        drop(state);

        if removed > 0 {
            debug!(removed, "Invalidated cache entries");
        }
        self.record_evictions(removed);
        removed
    }

    /// Remove every entry carrying exactly `tag`
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.invalidate_where(|metadata| metadata.has_tag(tag))
    }

    /// Metadata of a live entry. An expired entry is evicted and yields `None`.
    pub fn get_metadata(&self, key: &str) -> Option<CacheEntryMetadata> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if !state.enabled {
            return None;
        }

        let expired = state.entries.get(key)?.metadata.is_expired_at(now);
        if expired {
            state.entries.remove(key);
            state.evictions += 1;
            drop(state);
            self.metrics.record_cache_eviction();
            return None;
        }
        state.entries.get(key).map(|entry| entry.metadata.clone())
    }

    pub fn statistics(&self) -> CacheStatistics {
        let state = self.state.lock();
        CacheStatistics {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size: state.entries.len(),
            enabled: state.enabled,
        }
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a runtime configuration change.
    ///
    /// Disabling empties the cache. Shrinking `max_entries` evicts least
    /// recently used entries until the new bound holds.
    pub fn update_config(&self, update: CacheConfigUpdate) {
        let mut state = self.state.lock();
        if let Some(enabled) = update.enabled {
            state.enabled = enabled;
        }
        if let Some(ttl) = update.default_ttl {
            state.default_ttl = ttl;
        }
        if let Some(max_entries) = update.max_entries {
            state.max_entries = effective_max_entries(max_entries);
        }

        let evicted = if !state.enabled {
            Self::evict_all(&mut state)
        } else if let Some(max) = state.max_entries {
            let mut evicted = 0;
            while state.entries.len() > max {
                let Some(victim) = state.lru_key() else { break };
                state.entries.remove(&victim);
                state.evictions += 1;
                evicted += 1;
            }
            evicted
        } else {
            0
        };

        info!(
            enabled = state.enabled,
            max_entries = ?state.max_entries,
            evicted,
            "Cache configuration updated"
        );
        drop(state);
        self.record_evictions(evicted);
    }
}

impl Disposable for CacheService {
    fn dispose(&self) -> std::result::Result<(), BoxError> {
        let mut state = self.state.lock();
        let dropped = state.entries.len();
        state.entries.clear();
        debug!(namespace = %self.namespace, dropped, "Cache disposed");
        Ok(())
    }
}

impl Default for CacheService {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("namespace", &self.namespace)
            .field("statistics", &self.statistics())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder pattern for configuring a [`CacheService`]
pub struct CacheServiceBuilder {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn MetricsCollector>,
}

impl CacheServiceBuilder {
    /// Create a new cache builder
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(NoopMetricsCollector),
        }
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for expiry and LRU ordering
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Build the cache
    pub fn build(self) -> CacheService {
        CacheService {
            namespace: self.config.namespace,
            state: Mutex::new(State {
                entries: HashMap::new(),
                enabled: self.config.enabled,
                default_ttl: Duration::from_millis(self.config.default_ttl_ms),
                max_entries: effective_max_entries(self.config.max_entries),
                hits: 0,
                misses: 0,
                evictions: 0,
                next_seq: 0,
            }),
            clock: self.clock,
            metrics: self.metrics,
        }
    }
}

impl Default for CacheServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
