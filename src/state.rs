use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::CacheConfig;
use crate::events::EventBus;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::provisioning::ProvisioningManager;
use crate::pubsub::PubSubBroker;
use crate::rate_limit::RateLimiter;
use crate::registry::WorkerRegistry;
use crate::routing::InstanceRouter;

/// Shared application state for handlers. Every service is constructed in
/// `main.rs` and passed in explicitly; there are no module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CacheConfig>,
    pub router: Arc<InstanceRouter>,
    pub broker: Arc<PubSubBroker>,
    pub rate_limiter: Arc<RateLimiter>,
    pub provisioning: Arc<ProvisioningManager>,
    pub registry: Arc<WorkerRegistry>,
    pub metrics: Arc<CacheMetrics>,
    pub events: Arc<EventBus>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Point-in-time view across all engines and services.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            keys_total: self.router.total_keys(),
            memory_bytes: self.router.total_memory_bytes(),
            hits_total: self.metrics.hits(),
            misses_total: self.metrics.misses(),
            hit_rate: self.metrics.hit_rate(),
            evictions_total: self.metrics.evictions(),
            expired_keys_total: self.metrics.expired_keys(),
            uptime_seconds: self.uptime_seconds(),
            instances_total: self.provisioning.instance_count(),
            nodes_total: self.registry.node_count(),
            tee_instances: self.provisioning.tee_instance_count(),
        }
    }
}
