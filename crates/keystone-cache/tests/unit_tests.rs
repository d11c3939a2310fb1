//! Behavioural tests for the cache service
use std::sync::Arc;
use std::time::Duration;

use keystone_cache::*;
use keystone_common::{BoxError, CacheConfig, InMemoryMetricsCollector};

fn setup(config: CacheConfig) -> (CacheService, ManualClock, InMemoryMetricsCollector) {
    let clock = ManualClock::default();
    let metrics = InMemoryMetricsCollector::new();
    let cache = CacheService::builder()
        .config(config)
        .clock(Arc::new(clock.clone()))
        .metrics(Arc::new(metrics.clone()))
        .build();
    (cache, clock, metrics)
}

fn bounded(max_entries: usize) -> CacheConfig {
    CacheConfig {
        max_entries: Some(max_entries),
        ..CacheConfig::default()
    }
}

fn disabled() -> CacheConfig {
    CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    }
}

// ============================================================================
// Expiry
// ============================================================================

#[test]
fn test_expired_after_ttl() {
    let (cache, clock, metrics) = setup(CacheConfig::default());
    cache.set("k", "v".to_string(), CacheSetOptions::new().ttl(Duration::from_millis(100)));

    clock.advance(Duration::from_millis(101));
    let lookup = cache.get::<String>("k");

    assert!(!lookup.hit);
    assert!(lookup.value.is_none());
    let stats = cache.statistics();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0);
    assert_eq!(metrics.snapshot().cache_evictions, 1);
}

#[test]
fn test_hit_before_ttl() {
    let (cache, clock, _) = setup(CacheConfig::default());
    cache.set("k", "v".to_string(), CacheSetOptions::new().ttl(Duration::from_millis(100)));

    clock.advance(Duration::from_millis(99));
    let lookup = cache.get::<String>("k");

    assert!(lookup.hit);
    assert_eq!(lookup.value.as_deref().map(String::as_str), Some("v"));
    assert_eq!(cache.statistics().evictions, 0);
}

#[test]
fn test_expires_at_after_created_at() {
    let (cache, _, _) = setup(CacheConfig::default());
    let metadata = cache.set("k", 1u8, CacheSetOptions::new().ttl(Duration::from_nanos(1)));
    let expires_at = metadata.expires_at.unwrap();
    assert!(expires_at > metadata.created_at);
}

#[test]
fn test_expired_metadata_is_evicted() {
    let (cache, clock, _) = setup(CacheConfig::default());
    cache.set("k", 1u8, CacheSetOptions::new().ttl(Duration::from_millis(10)));
    assert!(cache.get_metadata("k").is_some());

    clock.advance(Duration::from_millis(10));
    assert!(cache.get_metadata("k").is_none());
    assert_eq!(cache.statistics().evictions, 1);
}

// ============================================================================
// Hits, metadata and has()
// ============================================================================

#[test]
fn test_hits_and_last_access_tracked() {
    let (cache, clock, metrics) = setup(CacheConfig::default());
    let stored = cache.set("k", 7u32, CacheSetOptions::new());

    clock.advance(Duration::from_millis(5));
    cache.get::<u32>("k");
    let lookup = cache.get::<u32>("k");

    let metadata = lookup.metadata.unwrap();
    assert_eq!(metadata.hits, 2);
    assert!(metadata.last_accessed_at > stored.last_accessed_at);
    assert_eq!(metrics.snapshot().cache_hits, 2);
    assert_eq!(metrics.snapshot().cache_stores, 1);
}

#[test]
fn test_has_does_not_count_as_use() {
    let (cache, _, _) = setup(CacheConfig::default());
    cache.set("k", 7u32, CacheSetOptions::new());

    assert!(cache.has("k"));
    assert!(!cache.has("other"));
    assert_eq!(cache.get_metadata("k").unwrap().hits, 0);
}

#[test]
fn test_tags_keep_case_and_first_occurrence() {
    let (cache, _, _) = setup(CacheConfig::default());
    let metadata = cache.set(
        "k",
        (),
        CacheSetOptions::new().tags(["Journal", "journal", "Journal", "ui"]),
    );
    assert_eq!(metadata.tags, vec!["Journal", "journal", "ui"]);
}

// ============================================================================
// Size bound
// ============================================================================

#[test]
fn test_max_entries_one_keeps_newest() {
    let (cache, _, _) = setup(bounded(1));
    cache.set("a", 1u32, CacheSetOptions::new());
    cache.set("b", 2u32, CacheSetOptions::new());

    assert!(!cache.has("a"));
    assert!(cache.has("b"));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.statistics().evictions, 1);
}

#[test]
fn test_lru_uses_last_access_not_insertion() {
    let (cache, clock, _) = setup(bounded(2));
    cache.set("a", 1u32, CacheSetOptions::new());
    clock.advance(Duration::from_millis(1));
    cache.set("b", 2u32, CacheSetOptions::new());
    clock.advance(Duration::from_millis(1));

    assert!(cache.get::<u32>("a").hit);
    clock.advance(Duration::from_millis(1));
    cache.set("c", 3u32, CacheSetOptions::new());

    assert!(cache.has("a"));
    assert!(!cache.has("b"));
    assert!(cache.has("c"));
}

#[test]
fn test_lru_tie_broken_by_access_order() {
    let (cache, _, _) = setup(bounded(2));
    cache.set("a", 1u32, CacheSetOptions::new());
    cache.set("b", 2u32, CacheSetOptions::new());
    cache.get::<u32>("a");
    cache.set("c", 3u32, CacheSetOptions::new());

    assert!(cache.has("a"));
    assert!(!cache.has("b"));
}

#[test]
fn test_shrinking_bound_evicts() {
    let (cache, _, _) = setup(CacheConfig::default());
    for i in 0..5u32 {
        cache.set(&format!("k{i}"), i, CacheSetOptions::new());
    }

    cache.update_config(CacheConfigUpdate {
        max_entries: Some(Some(2)),
        ..CacheConfigUpdate::default()
    });

    assert_eq!(cache.len(), 2);
    assert!(cache.has("k3"));
    assert!(cache.has("k4"));
    assert_eq!(cache.statistics().evictions, 3);
}

// ============================================================================
// Removal
// ============================================================================

#[test]
fn test_delete_and_clear_count_evictions() {
    let (cache, _, metrics) = setup(CacheConfig::default());
    cache.set("a", 1u32, CacheSetOptions::new());
    cache.set("b", 2u32, CacheSetOptions::new());
    cache.set("c", 3u32, CacheSetOptions::new());

    assert!(cache.delete("a"));
    assert!(!cache.delete("a"));
    assert_eq!(cache.clear(), 2);
    assert!(cache.is_empty());
    assert_eq!(cache.statistics().evictions, 3);
    assert_eq!(metrics.snapshot().cache_evictions, 3);
}

#[test]
fn test_invalidate_by_metadata_and_tag() {
    let (cache, _, _) = setup(CacheConfig::default());
    let keys = CacheNamespace::new("journal", "core");
    cache.set(&keys.item_key("entry", 1), 1u32, CacheSetOptions::new().tag("visible"));
    cache.set(&keys.item_key("entry", 2), 2u32, CacheSetOptions::new().tag("hidden"));
    cache.set("core:settings:flags", 3u32, CacheSetOptions::new().tag("visible"));

    assert_eq!(cache.invalidate_tag("Visible"), 0);
    assert_eq!(cache.invalidate_tag("visible"), 2);

    let prefix = keys.prefix();
    assert_eq!(cache.invalidate_where(|m| m.key.starts_with(&prefix)), 1);
    assert!(cache.is_empty());
}

// ============================================================================
// Disabled cache
// ============================================================================

#[test]
fn test_disabled_cache_is_a_no_op() {
    let (cache, _, metrics) = setup(disabled());

    let metadata = cache.set("k", 1u32, CacheSetOptions::new().tag("t"));
    assert_eq!(metadata.key, "k");
    assert!(!cache.get::<u32>("k").hit);
    assert!(!cache.has("k"));
    assert!(!cache.delete("k"));
    assert_eq!(cache.clear(), 0);
    assert_eq!(cache.invalidate_tag("t"), 0);
    assert!(cache.get_metadata("k").is_none());

    let stats = cache.statistics();
    assert!(!stats.enabled);
    assert_eq!((stats.hits, stats.misses, stats.evictions, stats.size), (0, 0, 0, 0));
    assert_eq!(metrics.snapshot().cache_misses, 0);
}

#[test]
fn test_disabling_at_runtime_empties_cache() {
    let (cache, _, _) = setup(CacheConfig::default());
    cache.set("a", 1u32, CacheSetOptions::new());
    cache.set("b", 2u32, CacheSetOptions::new());

    cache.update_config(CacheConfigUpdate {
        enabled: Some(false),
        ..CacheConfigUpdate::default()
    });
    assert!(cache.is_empty());
    assert_eq!(cache.statistics().evictions, 2);

    cache.update_config(CacheConfigUpdate {
        enabled: Some(true),
        ..CacheConfigUpdate::default()
    });
    cache.set("a", 1u32, CacheSetOptions::new());
    assert!(cache.has("a"));
}

// ============================================================================
// get_or_set
// ============================================================================

#[test]
fn test_get_or_set_with_runs_factory_once() {
    let (cache, _, _) = setup(CacheConfig::default());
    let mut calls = 0;

    let first = cache
        .get_or_set_with("k", || {
            calls += 1;
            Ok::<_, BoxError>(42u32)
        }, CacheSetOptions::new())
        .unwrap();
    assert!(!first.hit);
    assert_eq!(first.value.as_deref(), Some(&42));

    let second = cache
        .get_or_set_with("k", || -> std::result::Result<u32, BoxError> { panic!("factory must not run") }, CacheSetOptions::new())
        .unwrap();
    assert!(second.hit);
    assert_eq!(calls, 1);
}

#[test]
fn test_get_or_set_with_factory_error() {
    let (cache, _, _) = setup(CacheConfig::default());
    let err = cache
        .get_or_set_with::<u32, _>("k", || Err("backend offline".into()), CacheSetOptions::new())
        .unwrap_err();

    assert!(matches!(err, CacheError::FactoryFailed { .. }));
    assert_eq!(err.to_string(), "Factory failed for cache key k");
    assert!(!cache.has("k"));
}

#[tokio::test]
async fn test_get_or_set_async() {
    let (cache, _, _) = setup(CacheConfig::default());

    let first = cache
        .get_or_set("k", || async { Ok::<_, BoxError>("built".to_string()) }, CacheSetOptions::new())
        .await
        .unwrap();
    assert!(!first.hit);

    let second = cache
        .get_or_set("k", || async { Ok::<_, BoxError>("rebuilt".to_string()) }, CacheSetOptions::new())
        .await
        .unwrap();
    assert!(second.hit);
    assert_eq!(second.value.as_deref().map(String::as_str), Some("built"));
}

#[tokio::test]
async fn test_get_or_set_disabled_always_runs_factory() {
    let (cache, _, _) = setup(disabled());

    for expected in ["one", "two"] {
        let lookup = cache
            .get_or_set("k", || async move { Ok::<_, BoxError>(expected) }, CacheSetOptions::new())
            .await
            .unwrap();
        assert!(!lookup.hit);
        assert_eq!(lookup.value.as_deref(), Some(&expected));
    }
    assert!(cache.is_empty());
}

#[test]
fn test_statistics_and_metadata_serialize() {
    let (cache, _, _) = setup(CacheConfig::default());
    let metadata = cache.set("k", 1u32, CacheSetOptions::new().ttl(Duration::ZERO).tag("t"));
    cache.get::<u32>("k");
    cache.get::<u32>("missing");

    let stats = serde_json::to_value(cache.statistics()).unwrap();
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    assert_eq!(stats["enabled"], true);
    assert_eq!(cache.statistics().hit_rate(), 50.0);

    let json = serde_json::to_string(&metadata).unwrap();
    let parsed: CacheEntryMetadata = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, metadata);
    assert!(parsed.expires_at.is_none());
}
