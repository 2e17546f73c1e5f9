use std::sync::Arc;

use dashmap::DashMap;

use crate::config::CacheConfig;
use crate::engine::{CacheEngine, EngineConfig};
use crate::errors::{CacheError, CacheResult};
use crate::events::EventBus;
use crate::metrics::CacheMetrics;
use crate::provisioning::{find_plan, InstanceRecord, ProvisioningManager};
use crate::tee::TeeProvider;

/// The engine serving one namespace, plus the TEE seam when the namespace
/// is enclave-backed.
#[derive(Clone)]
pub struct ResolvedEngine {
    pub engine: Arc<CacheEngine>,
    pub tee: Option<Arc<dyn TeeProvider>>,
    pub instance: Option<InstanceRecord>,
}

impl std::fmt::Debug for ResolvedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedEngine")
            .field("tee", &self.tee.is_some())
            .field("instance", &self.instance)
            .finish()
    }
}

/// Maps a namespace to the engine that owns it: the shared default engine,
/// a per-instance engine sized by its plan, or the TEE-wrapped variant.
/// This is the only place engines are constructed at request time.
pub struct InstanceRouter {
    shared: Arc<CacheEngine>,
    engines: DashMap<String, Arc<CacheEngine>>,
    provisioning: Arc<ProvisioningManager>,
    tee: Option<Arc<dyn TeeProvider>>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
    events: Arc<EventBus>,
}

impl InstanceRouter {
    pub fn new(
        config: CacheConfig,
        provisioning: Arc<ProvisioningManager>,
        tee: Option<Arc<dyn TeeProvider>>,
        metrics: Arc<CacheMetrics>,
        events: Arc<EventBus>,
    ) -> Self {
        let shared = Arc::new(CacheEngine::new(
            EngineConfig::from(&config),
            Arc::clone(&metrics),
            Arc::clone(&events),
        ));
        Self {
            shared,
            engines: DashMap::new(),
            provisioning,
            tee,
            config,
            metrics,
            events,
        }
    }

    /// Resolves the engine for a namespace, enforcing the billing gate for
    /// subscription-billed instances.
    pub async fn resolve(&self, namespace: &str) -> CacheResult<ResolvedEngine> {
        let Some(record) = self.provisioning.resolve_namespace(namespace) else {
            return Ok(ResolvedEngine {
                engine: Arc::clone(&self.shared),
                tee: None,
                instance: None,
            });
        };

        self.provisioning.authorize(&record).await?;

        let engine = self
            .engines
            .entry(namespace.to_string())
            .or_insert_with(|| {
                let max_memory_mb = find_plan(&record.plan_id)
                    .map_or(self.config.max_memory_mb, |plan| plan.max_memory_mb);
                Arc::new(CacheEngine::new(
                    EngineConfig {
                        max_memory_bytes: max_memory_mb * 1024 * 1024,
                        default_ttl_seconds: self.config.default_ttl_seconds,
                        max_ttl_seconds: self.config.max_ttl_seconds,
                    },
                    Arc::clone(&self.metrics),
                    Arc::clone(&self.events),
                ))
            })
            .clone();

        let tee = if record.tee_enabled {
            match &self.tee {
                Some(provider) => Some(Arc::clone(provider)),
                None => {
                    return Err(CacheError::NodeUnavailable(
                        "namespace requires a TEE provider but none is configured".into(),
                    ))
                }
            }
        } else {
            None
        };

        Ok(ResolvedEngine {
            engine,
            tee,
            instance: Some(record),
        })
    }

    pub fn shared(&self) -> Arc<CacheEngine> {
        Arc::clone(&self.shared)
    }

    /// Every live engine: the shared one plus all memoized per-instance
    /// engines. Used by the reaper and the metrics gauges.
    pub fn engines(&self) -> Vec<Arc<CacheEngine>> {
        let mut engines = vec![Arc::clone(&self.shared)];
        engines.extend(self.engines.iter().map(|e| Arc::clone(e.value())));
        engines
    }

    /// Flushes and forgets a namespace's engine (instance deletion).
    pub fn drop_namespace(&self, namespace: &str) {
        if let Some((_, engine)) = self.engines.remove(namespace) {
            engine.flush_db(namespace);
        } else {
            self.shared.flush_db(namespace);
        }
    }

    pub fn total_keys(&self) -> u64 {
        self.engines().iter().map(|e| e.key_count()).sum()
    }

    pub fn total_memory_bytes(&self) -> u64 {
        self.engines().iter().map(|e| e.used_bytes()).sum()
    }
}
