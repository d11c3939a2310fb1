//! Namespaced in-memory cache with TTL, LRU bound and tag invalidation
//!
//! Caching is an optimization, so nothing here fails on the read or write
//! path: a disabled cache simply misses. Keys are built per module with
//! [`create_cache_key`] or a [`CacheNamespace`].
//!
//! ```rust
//! use std::time::Duration;
//! use keystone_cache::{CacheNamespace, CacheService, CacheSetOptions};
//! use keystone_common::CacheConfig;
//!
//! let cache = CacheService::new(CacheConfig::default());
//! let keys = CacheNamespace::new("settings", "core");
//! let key = keys.item_key("flag", "dark-mode");
//!
//! cache.set(&key, true, CacheSetOptions::new().ttl(Duration::from_secs(60)).tag("ui"));
//! assert_eq!(cache.get::<bool>(&key).value.as_deref(), Some(&true));
//!
//! assert_eq!(cache.invalidate_tag("ui"), 1);
//! assert!(!cache.has(&key));
//! ```

pub mod clock;
pub mod di;
pub mod error;
pub mod key;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use di::{register_cache_service, CACHE_SERVICE};
pub use error::{CacheError, Result};
pub use key::{create_cache_key, CacheKey, CacheKeyParts, CacheNamespace, KEY_SEPARATOR};
pub use service::{
    CacheConfigUpdate, CacheEntryMetadata, CacheLookup, CacheService, CacheServiceBuilder,
    CacheSetOptions, CacheStatistics,
};
