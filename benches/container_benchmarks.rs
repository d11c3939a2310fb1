use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keystone_cache::{CacheSetOptions, CACHE_SERVICE};
use keystone_common::KeystoneConfig;
use keystone_di::{register_discovered_modules, ServiceContainer, ServiceLifecycle, Token};
use keystone_ports::{PortRegistry, PortSelector, StaticVersionDetector};

// ============================================================================
// Full bootstrap
// ============================================================================

fn bench_bootstrap(c: &mut Criterion) {
    c.bench_function("bootstrap_core_and_discovered_modules", |b| {
        b.iter(|| {
            let container = ServiceContainer::builder()
                .with_core_services(KeystoneConfig::default())
                .build()
                .unwrap();
            register_discovered_modules(&container).unwrap();
            container.validate().unwrap();
            black_box(container.resolve_with_error(&*CACHE_SERVICE).unwrap());
            container.dispose().unwrap();
        })
    });
}

// ============================================================================
// Port selection
// ============================================================================

fn bench_port_selection(c: &mut Criterion) {
    let container = ServiceContainer::new();
    let mut registry = PortRegistry::<u32>::new("numbers");
    for version in 10..20u32 {
        let token = Token::<u32>::new(format!("V{version}"));
        container
            .register_factory(&token, move |_| Ok(Arc::new(version)), ServiceLifecycle::Singleton, vec![])
            .unwrap();
        registry.register(version, token).unwrap();
    }
    container.validate().unwrap();
    let selector = PortSelector::new(Arc::new(StaticVersionDetector::new(15)));

    c.bench_function("select_port_singleton", |b| {
        b.iter(|| black_box(selector.select_port(&container, &registry).unwrap()))
    });
}

// ============================================================================
// Cache through the container
// ============================================================================

fn bench_resolved_cache(c: &mut Criterion) {
    let container = ServiceContainer::builder()
        .with_core_services(KeystoneConfig::default())
        .build()
        .unwrap();
    register_discovered_modules(&container).unwrap();
    container.validate().unwrap();

    c.bench_function("resolve_cache_and_get_or_set", |b| {
        b.iter(|| {
            let cache = container.resolve_with_error(&*CACHE_SERVICE).unwrap();
            black_box(
                cache
                    .get_or_set_with("bench:key", || Ok(42u64), CacheSetOptions::new())
                    .unwrap(),
            )
        })
    });
}

criterion_group!(benches, bench_bootstrap, bench_port_selection, bench_resolved_cache);
criterion_main!(benches);
