pub mod store;
pub mod types;

pub use store::{SqliteWorkerStore, WorkerStore};
pub use types::{
    LookupSource, PodHeartbeat, PodIdentity, WarmPod, WorkerDefinition, WorkerLocation,
    WorkerLookup,
};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use crate::engine::{CacheEngine, SetOptions};
use crate::errors::CacheResult;
use crate::events::{CacheEvent, EventBus};
use crate::registry::store::with_retry;

/// Reserved namespace carrying all registry state.
pub const REGISTRY_NAMESPACE: &str = "worker-registry";

const HEARTBEAT_TTL_SECONDS: u64 = 30;
const WORKER_LIST_TTL_SECONDS: u64 = 30;
const META_TTL_SECONDS: u64 = 300;
const LOCATION_TTL_SECONDS: u64 = 60;
/// Pod stanzas without a heartbeat in this window are filtered on read.
const STALE_POD_MS: i64 = 60_000;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const RESYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Fleet-wide key-location registry built on top of the cache itself:
/// pod heartbeats, per-worker warm-pod sets, and a multi-tier lookup
/// (local map → cache → persistent store).
pub struct WorkerRegistry {
    pod: PodIdentity,
    engine: Arc<CacheEngine>,
    store: Option<Arc<dyn WorkerStore>>,
    local: DashMap<String, WorkerDefinition>,
    active_invocations: AtomicU32,
    events: Arc<EventBus>,
}

impl WorkerRegistry {
    pub fn new(
        pod: PodIdentity,
        engine: Arc<CacheEngine>,
        store: Option<Arc<dyn WorkerStore>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            pod,
            engine,
            store,
            local: DashMap::new(),
            active_invocations: AtomicU32::new(0),
            events,
        }
    }

    pub fn pod(&self) -> &PodIdentity {
        &self.pod
    }

    /// Multi-tier lookup. Non-memory hits register the worker locally and
    /// are flagged as cold starts.
    pub async fn get_worker(&self, worker_id: &str) -> CacheResult<Option<WorkerLookup>> {
        if let Some(def) = self.local.get(worker_id) {
            return Ok(Some(WorkerLookup {
                definition: def.clone(),
                source: LookupSource::Memory,
                cold_start: false,
            }));
        }

        if let Some(raw) = self
            .engine
            .get(REGISTRY_NAMESPACE, &format!("meta:{worker_id}"))?
        {
            match serde_json::from_str::<WorkerDefinition>(&raw) {
                Ok(def) => {
                    self.register_local(&def)?;
                    return Ok(Some(WorkerLookup {
                        definition: def,
                        source: LookupSource::Cache,
                        cold_start: true,
                    }));
                }
                Err(err) => {
                    tracing::warn!("discarding malformed meta:{}: {}", worker_id, err);
                }
            }
        }

        if let Some(store) = &self.store {
            let found =
                with_retry("get", || async { store.get(worker_id).await }).await;
            match found {
                Ok(Some(def)) => {
                    self.register_local(&def)?;
                    return Ok(Some(WorkerLookup {
                        definition: def,
                        source: LookupSource::Persistent,
                        cold_start: true,
                    }));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!("worker store lookup for {} failed: {}", worker_id, err);
                }
            }
        }

        Ok(None)
    }

    /// Registers a worker as loaded on this pod: local map, `meta:` entry,
    /// and its stanza inside `location:<id>`.
    pub fn register_local(&self, def: &WorkerDefinition) -> CacheResult<()> {
        self.local.insert(def.id.clone(), def.clone());
        self.upload_meta(def)?;
        self.merge_own_location(def)?;
        Ok(())
    }

    /// Forgets a worker on this pod and removes its stanza.
    pub fn unregister_local(&self, worker_id: &str) -> CacheResult<()> {
        let Some((_, def)) = self.local.remove(worker_id) else {
            return Ok(());
        };
        let key = format!("location:{worker_id}");
        if let Some(mut location) = self.read_location(&key)? {
            location.warm_pods.retain(|p| p.pod_id != self.pod.pod_id);
            location.updated_at = Utc::now().timestamp_millis();
            self.write_json(&key, &location, LOCATION_TTL_SECONDS)?;
        }
        tracing::debug!("unloaded worker {} ({})", def.id, def.code_cid);
        Ok(())
    }

    /// `FindWarmPods` — stale stanzas are dropped; results are sorted
    /// same-region-first, then by ascending active invocations.
    pub async fn find_warm_pods(
        &self,
        worker_id: &str,
        preferred_region: Option<&str>,
    ) -> CacheResult<Vec<WarmPod>> {
        let key = format!("location:{worker_id}");
        let Some(location) = self.read_location(&key)? else {
            return Ok(Vec::new());
        };

        let now = Utc::now().timestamp_millis();
        let mut pods: Vec<WarmPod> = location
            .warm_pods
            .into_iter()
            .filter(|p| now - p.last_heartbeat <= STALE_POD_MS)
            .collect();

        pods.sort_by_key(|p| {
            let region_rank = match preferred_region {
                Some(region) if p.region == region => 0u8,
                Some(_) => 1,
                None => 0,
            };
            (region_rank, p.active_invocations)
        });
        Ok(pods)
    }

    /// One heartbeat: pod stanza, worker-id list, and a refresh of every
    /// owned `location:` entry.
    pub fn heartbeat(&self) -> CacheResult<()> {
        let now = Utc::now().timestamp_millis();
        let worker_ids: Vec<String> = self.local.iter().map(|e| e.key().clone()).collect();

        let beat = PodHeartbeat {
            pod_id: self.pod.pod_id.clone(),
            region: self.pod.region.clone(),
            endpoint: self.pod.endpoint.clone(),
            worker_count: worker_ids.len(),
            timestamp: now,
        };
        self.write_json(
            &format!("heartbeat:{}", self.pod.pod_id),
            &beat,
            HEARTBEAT_TTL_SECONDS,
        )?;
        self.write_json(
            &format!("workers:{}", self.pod.pod_id),
            &worker_ids,
            WORKER_LIST_TTL_SECONDS,
        )?;

        for entry in self.local.iter() {
            self.merge_own_location(entry.value())?;
        }
        Ok(())
    }

    /// Re-reads the persistent store to pick up workers deployed elsewhere.
    pub async fn resync(&self) -> CacheResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let definitions = with_retry("list_active", || async { store.list_active().await })
            .await
            .map_err(crate::errors::CacheError::from)?;

        let mut added = 0;
        for def in definitions {
            if !self.local.contains_key(&def.id) {
                self.register_local(&def)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Live pods, read from the heartbeat keys.
    pub fn live_pods(&self) -> CacheResult<Vec<PodHeartbeat>> {
        let mut pods = Vec::new();
        for key in self.engine.keys(REGISTRY_NAMESPACE, "heartbeat:*") {
            if let Some(raw) = self.engine.get(REGISTRY_NAMESPACE, &key)? {
                if let Ok(beat) = serde_json::from_str::<PodHeartbeat>(&raw) {
                    pods.push(beat);
                }
            }
        }
        pods.sort_by(|a, b| a.pod_id.cmp(&b.pod_id));
        Ok(pods)
    }

    pub fn node_count(&self) -> u64 {
        self.engine.keys(REGISTRY_NAMESPACE, "heartbeat:*").len() as u64
    }

    pub fn invocation_started(&self) {
        self.active_invocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invocation_finished(&self) {
        let _ = self
            .active_invocations
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                n.checked_sub(1)
            });
    }

    /// Stops advertising this pod. Emits `NodeLeave`.
    pub fn close(&self) {
        let _ = self.engine.del(
            REGISTRY_NAMESPACE,
            &[format!("heartbeat:{}", self.pod.pod_id)],
        );
        self.events.emit(CacheEvent::NodeLeave {
            node_id: self.pod.pod_id.clone(),
        });
    }

    /// Heartbeat loop; emits `NodeJoin` once on startup.
    pub async fn run_heartbeat(self: Arc<Self>) {
        self.events.emit(CacheEvent::NodeJoin {
            node_id: self.pod.pod_id.clone(),
        });
        let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(err) = self.heartbeat() {
                tracing::error!("heartbeat failed: {}", err);
            }
        }
    }

    /// Store resync loop.
    pub async fn run_resync(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(RESYNC_INTERVAL);
        loop {
            ticker.tick().await;
            match self.resync().await {
                Ok(added) if added > 0 => {
                    tracing::info!("resync registered {} new workers", added);
                }
                Ok(_) => {}
                Err(err) => tracing::error!("resync failed: {}", err),
            }
        }
    }

    fn upload_meta(&self, def: &WorkerDefinition) -> CacheResult<()> {
        self.write_json(&format!("meta:{}", def.id), def, META_TTL_SECONDS)
    }

    /// Reads `location:<id>`, drops stale stanzas, upserts our own.
    fn merge_own_location(&self, def: &WorkerDefinition) -> CacheResult<()> {
        let key = format!("location:{}", def.id);
        let now = Utc::now().timestamp_millis();

        let mut location = self.read_location(&key)?.unwrap_or(WorkerLocation {
            worker_id: def.id.clone(),
            code_cid: def.code_cid.clone(),
            warm_pods: Vec::new(),
            metadata: def.metadata.clone(),
            updated_at: now,
        });

        location
            .warm_pods
            .retain(|p| p.pod_id != self.pod.pod_id && now - p.last_heartbeat <= STALE_POD_MS);
        location.warm_pods.push(WarmPod {
            pod_id: self.pod.pod_id.clone(),
            region: self.pod.region.clone(),
            endpoint: self.pod.endpoint.clone(),
            last_heartbeat: now,
            active_invocations: self.active_invocations.load(Ordering::Relaxed),
        });
        location.code_cid = def.code_cid.clone();
        location.updated_at = now;

        self.write_json(&key, &location, LOCATION_TTL_SECONDS)
    }

    fn read_location(&self, key: &str) -> CacheResult<Option<WorkerLocation>> {
        let Some(raw) = self.engine.get(REGISTRY_NAMESPACE, key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(location) => Ok(Some(location)),
            Err(err) => {
                tracing::warn!("discarding malformed {}: {}", key, err);
                Ok(None)
            }
        }
    }

    fn write_json<T: serde::Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.engine.set(
            REGISTRY_NAMESPACE,
            key,
            raw,
            SetOptions {
                ttl: Some(ttl_seconds),
                ..SetOptions::default()
            },
        )?;
        Ok(())
    }
}
