#![allow(dead_code)]

use std::sync::Arc;

use cachegrid_backend::config::CacheConfig;
use cachegrid_backend::engine::{CacheEngine, EngineConfig};
use cachegrid_backend::events::EventBus;
use cachegrid_backend::metrics::CacheMetrics;
use cachegrid_backend::provisioning::{AllowAllBilling, ProvisioningManager};
use cachegrid_backend::pubsub::PubSubBroker;
use cachegrid_backend::rate_limit::RateLimiter;
use cachegrid_backend::registry::{PodIdentity, WorkerRegistry};
use cachegrid_backend::routing::InstanceRouter;
use cachegrid_backend::state::AppState;

pub const OWNER: &str = "0x00112233445566778899aabbccddeeff00112233";
pub const OTHER_OWNER: &str = "0xffeeddccbbaa99887766554433221100ffeeddcc";

/// An engine with an explicit byte budget and no default TTL, sharing the
/// given metrics.
pub fn engine_with(max_memory_bytes: u64, metrics: Arc<CacheMetrics>) -> CacheEngine {
    CacheEngine::new(
        EngineConfig {
            max_memory_bytes,
            default_ttl_seconds: 0,
            max_ttl_seconds: 30 * 24 * 3600,
        },
        metrics,
        Arc::new(EventBus::new()),
    )
}

pub fn engine() -> CacheEngine {
    engine_with(256 * 1024 * 1024, Arc::new(CacheMetrics::new()))
}

/// Full application state wired the way `main.rs` does it, without the
/// background loops.
pub fn app_state() -> AppState {
    let config = CacheConfig::default();
    let events = Arc::new(EventBus::new());
    let metrics = Arc::new(CacheMetrics::new());
    let provisioning = Arc::new(ProvisioningManager::new(
        Arc::new(AllowAllBilling),
        Arc::clone(&events),
    ));
    let router = Arc::new(InstanceRouter::new(
        config.clone(),
        Arc::clone(&provisioning),
        None,
        Arc::clone(&metrics),
        Arc::clone(&events),
    ));
    let registry = Arc::new(WorkerRegistry::new(
        PodIdentity {
            pod_id: "pod-test".into(),
            region: "local".into(),
            endpoint: "http://127.0.0.1:8080".into(),
        },
        router.shared(),
        None,
        Arc::clone(&events),
    ));

    AppState {
        config: Arc::new(config),
        router,
        broker: Arc::new(PubSubBroker::new()),
        rate_limiter: Arc::new(RateLimiter::new()),
        provisioning,
        registry,
        metrics,
        events,
        started_at: chrono::Utc::now(),
    }
}
