//! Property-based tests for the cache bounds

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use keystone_cache::*;
use keystone_common::CacheConfig;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_size_never_exceeds_bound(
        max in 1usize..8,
        keys in prop::collection::vec(0u8..20, 1..60),
    ) {
        let cache = CacheService::new(CacheConfig {
            max_entries: Some(max),
            ..CacheConfig::default()
        });

        for key in &keys {
            cache.set(&key.to_string(), *key, CacheSetOptions::new());
            prop_assert!(cache.len() <= max);
        }

        // The most recent write always survives
        let last = keys[keys.len() - 1].to_string();
        prop_assert!(cache.has(&last));
    }
}

proptest! {
    #[test]
    fn test_tags_unique_and_ordered(tags in prop::collection::vec("[a-cA-C]", 0..12)) {
        let cache = CacheService::default();
        let metadata = cache.set("k", (), CacheSetOptions::new().tags(tags.clone()));

        let mut seen = HashSet::new();
        let expected: Vec<String> = tags.into_iter().filter(|t| seen.insert(t.clone())).collect();
        prop_assert_eq!(metadata.tags, expected);
    }
}

proptest! {
    #[test]
    fn test_expiry_boundary(ttl_ms in 1u64..10_000, elapsed_ms in 0u64..20_000) {
        let clock = ManualClock::default();
        let cache = CacheService::builder().clock(Arc::new(clock.clone())).build();
        cache.set("k", 1u32, CacheSetOptions::new().ttl(Duration::from_millis(ttl_ms)));

        clock.advance(Duration::from_millis(elapsed_ms));
        let hit = cache.get::<u32>("k").hit;
        prop_assert_eq!(hit, elapsed_ms < ttl_ms);
        prop_assert_eq!(cache.statistics().evictions, u64::from(!hit));
    }
}
