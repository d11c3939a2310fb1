//! Container registration for the cache service

use std::sync::Arc;

use keystone_di::{
    ServiceContainer, ServiceLifecycle, ServiceModule, Token, KEYSTONE_CONFIG, METRICS_COLLECTOR,
};
use once_cell::sync::Lazy;
use tracing::debug;

use crate::service::CacheService;

/// Token for the shared [`CacheService`]
pub static CACHE_SERVICE: Lazy<Token<CacheService>> = Lazy::new(|| Token::new("CacheService"));

/// Registration priority; runs after core services are in place
pub const CACHE_MODULE_PRIORITY: u32 = 200;

inventory::submit! {
    ServiceModule::with_priority("cache", register_cache_service, CACHE_MODULE_PRIORITY)
}

/// Register [`CACHE_SERVICE`] as a singleton built from the container's
/// [`KEYSTONE_CONFIG`] and [`METRICS_COLLECTOR`].
///
/// The cache is emptied when the container is disposed.
pub fn register_cache_service(container: &ServiceContainer) -> keystone_di::Result<()> {
    container.register_disposable_factory(
        &*CACHE_SERVICE,
        |deps| {
            let config = deps.get(&*KEYSTONE_CONFIG)?;
            let metrics = deps.get(&*METRICS_COLLECTOR)?;
            let cache = CacheService::builder()
                .config(config.cache.clone())
                .metrics(metrics)
                .build();
            debug!(namespace = %cache.namespace(), "Built cache service");
            Ok(Arc::new(cache))
        },
        ServiceLifecycle::Singleton,
        vec![KEYSTONE_CONFIG.key(), METRICS_COLLECTOR.key()],
    )
}
