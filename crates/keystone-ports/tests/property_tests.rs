//! Property-based tests for selection determinism

use std::collections::BTreeSet;
use std::sync::Arc;

use keystone_di::ServiceContainer;
use keystone_ports::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_selection_is_exact(
        versions in prop::collection::btree_set(1u32..40, 1..8),
        detected in 1u32..40,
    ) {
        let container = ServiceContainer::new();
        container.validate().unwrap();

        let mut registry = PortRegistry::<u32>::new("numbers");
        for &version in &versions {
            registry.register_factory(version, move |_| Ok(Arc::new(version))).unwrap();
        }

        let selector = PortSelector::new(Arc::new(StaticVersionDetector::new(detected)));
        match selector.select_port(&container, &registry) {
            Ok(port) => {
                prop_assert!(versions.contains(&detected));
                prop_assert_eq!(*port, detected);
            }
            Err(err) => {
                prop_assert!(!versions.contains(&detected));
                let available: BTreeSet<u32> = err.available_versions().iter().copied().collect();
                prop_assert_eq!(available, versions);
                prop_assert_eq!(err.requested_version(), Some(detected));
            }
        }
    }
}

proptest! {
    #[test]
    fn test_duplicate_versions_always_rejected(version in any::<u32>()) {
        let mut registry = PortRegistry::<u32>::new("numbers");
        registry.register_factory(version, |_| Ok(Arc::new(0))).unwrap();
        prop_assert!(registry.register_factory(version, |_| Ok(Arc::new(1))).is_err());
        prop_assert_eq!(registry.len(), 1);
    }
}
