pub mod entry;
mod hashes;
mod keyspace;
mod lists;
pub mod lru;
pub mod reaper;
mod sets;
mod streams;
mod strings;
pub mod value;
mod zsets;

pub use entry::{Entry, Kind, NO_EXPIRY};
pub use keyspace::ScanPage;
pub use strings::SetOptions;
pub use value::{StreamEntry, Value, ZsetMember};

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::config::CacheConfig;
use crate::errors::{CacheError, CacheResult};
use crate::events::{CacheEvent, EventBus};
use crate::metrics::CacheMetrics;

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_memory_bytes: u64,
    pub default_ttl_seconds: u64,
    pub max_ttl_seconds: u64,
}

impl From<&CacheConfig> for EngineConfig {
    fn from(config: &CacheConfig) -> Self {
        Self {
            max_memory_bytes: config.max_memory_bytes(),
            default_ttl_seconds: config.default_ttl_seconds,
            max_ttl_seconds: config.max_ttl_seconds,
        }
    }
}

/// Keyspace of one tenant. Created lazily on first write; destroyed by a
/// flush. `used_bytes` is the exact sum of `entry.data` lengths.
#[derive(Debug, Default)]
struct NamespaceData {
    entries: HashMap<String, Entry>,
    used_bytes: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Default)]
struct EngineInner {
    namespaces: HashMap<String, NamespaceData>,
    lru: lru::LruIndex,
    used_total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceStats {
    pub namespace: String,
    pub keys: usize,
    pub used_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub namespaces: Vec<NamespaceStats>,
    pub keys_total: u64,
    pub used_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// The data-structure engine. All mutating commands, the eviction loop and
/// the TTL sweep serialize on one critical section; handlers never hold it
/// across an await point.
pub struct CacheEngine {
    config: EngineConfig,
    inner: Mutex<EngineInner>,
    metrics: Arc<CacheMetrics>,
    events: Arc<EventBus>,
}

impl CacheEngine {
    pub fn new(config: EngineConfig, metrics: Arc<CacheMetrics>, events: Arc<EventBus>) -> Self {
        Self {
            config,
            inner: Mutex::new(EngineInner::default()),
            metrics,
            events,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolves a caller-supplied TTL into an absolute deadline.
    /// `None` takes the configured default; an explicit 0 stores forever.
    pub(crate) fn expiry_from_ttl(&self, ttl: Option<u64>, now: i64) -> CacheResult<i64> {
        let seconds = match ttl {
            Some(t) if t > self.config.max_ttl_seconds => {
                return Err(CacheError::TtlExceeded {
                    requested: t,
                    max: self.config.max_ttl_seconds,
                })
            }
            Some(0) => return Ok(NO_EXPIRY),
            Some(t) => t,
            None if self.config.default_ttl_seconds == 0 => return Ok(NO_EXPIRY),
            None => self.config.default_ttl_seconds,
        };
        Ok(now + (seconds as i64) * 1000)
    }

    /// Read path shared by every kind: lazy expiry, kind check, decode,
    /// recency and hit/miss accounting.
    pub(crate) fn read_value<T>(
        &self,
        namespace: &str,
        key: &str,
        kind: Kind,
        f: impl FnOnce(&Value) -> T,
    ) -> CacheResult<Option<T>> {
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        let Some(entry) = inner
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.entries.get_mut(key))
        else {
            inner.record_miss(namespace, &self.metrics);
            return Ok(None);
        };

        if entry.kind != kind {
            return Err(CacheError::invalid(format!(
                "operation against a key holding {}, expected {}",
                entry.kind, kind
            )));
        }

        entry.touch(now);
        let value = Value::decode(entry.kind, &entry.data)?;
        inner.lru.touch(namespace, key);
        inner.record_hit(namespace, &self.metrics);
        self.events.emit(CacheEvent::KeyGet {
            namespace: namespace.to_string(),
            key: key.to_string(),
        });
        Ok(Some(f(&value)))
    }

    /// Mutation path shared by the collection kinds: decode, modify,
    /// re-encode, re-account, enforce the budget. The closure also receives
    /// whether the key already held a live entry.
    pub(crate) fn mutate_value<T>(
        &self,
        namespace: &str,
        key: &str,
        kind: Kind,
        f: impl FnOnce(&mut Value, bool) -> CacheResult<T>,
    ) -> CacheResult<T> {
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        let existing = inner
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key));

        let (mut value, created_at, expires_at, access_count, existed) = match existing {
            Some(entry) => {
                if entry.kind != kind {
                    return Err(CacheError::invalid(format!(
                        "operation against a key holding {}, expected {}",
                        entry.kind, kind
                    )));
                }
                (
                    Value::decode(entry.kind, &entry.data)?,
                    entry.created_at,
                    entry.expires_at,
                    entry.access_count,
                    true,
                )
            }
            None => (
                Value::empty(kind),
                now,
                self.expiry_from_ttl(None, now)?,
                0,
                false,
            ),
        };

        let result = f(&mut value, existed)?;

        if value.is_drained() {
            if existed {
                inner.drop_entry(namespace, key);
                self.events.emit(CacheEvent::KeyDelete {
                    namespace: namespace.to_string(),
                    key: key.to_string(),
                });
            }
            return Ok(result);
        }

        let mut entry = Entry::new(value.encode()?, kind, created_at, expires_at);
        entry.last_accessed_at = now;
        entry.access_count = access_count + 1;

        inner.commit_entry(
            namespace,
            key,
            entry,
            self.config.max_memory_bytes,
            &self.metrics,
            &self.events,
        )?;
        Ok(result)
    }

    /// Drops every expired entry. Called by the reaper; lazy expiry on the
    /// access paths keeps correctness between sweeps.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = now_ms();

        let due: Vec<(String, String)> = inner
            .namespaces
            .iter()
            .flat_map(|(ns_name, ns)| {
                ns.entries
                    .iter()
                    .filter(|(_, entry)| entry.is_expired(now))
                    .map(|(key, _)| (ns_name.clone(), key.clone()))
            })
            .collect();

        let mut swept = 0;
        for (namespace, key) in due {
            if inner.drop_entry(&namespace, &key).is_some() {
                swept += 1;
                self.metrics.record_expired_key();
                self.events.emit(CacheEvent::KeyExpire { namespace, key });
            }
        }
        swept
    }

    /// Drops an entire namespace. Returns false when it never existed.
    pub fn flush_db(&self, namespace: &str) -> bool {
        let mut inner = self.lock();
        match inner.namespaces.remove(namespace) {
            Some(ns) => {
                inner.used_total -= ns.used_bytes;
                inner.lru.remove_namespace(namespace);
                true
            }
            None => false,
        }
    }

    pub fn flush_all(&self) {
        let mut inner = self.lock();
        inner.namespaces.clear();
        inner.lru.clear();
        inner.used_total = 0;
    }

    pub fn stats(&self) -> EngineStats {
        let inner = self.lock();
        let mut namespaces: Vec<NamespaceStats> = inner
            .namespaces
            .iter()
            .map(|(name, ns)| NamespaceStats {
                namespace: name.clone(),
                keys: ns.entries.len(),
                used_bytes: ns.used_bytes,
                hits: ns.hits,
                misses: ns.misses,
            })
            .collect();
        namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));

        let keys_total = namespaces.iter().map(|n| n.keys as u64).sum();
        let hits = namespaces.iter().map(|n| n.hits).sum();
        let misses = namespaces.iter().map(|n| n.misses).sum();
        EngineStats {
            namespaces,
            keys_total,
            used_bytes: inner.used_total,
            hits,
            misses,
        }
    }

    pub fn key_count(&self) -> u64 {
        let inner = self.lock();
        inner
            .namespaces
            .values()
            .map(|ns| ns.entries.len() as u64)
            .sum()
    }

    pub fn used_bytes(&self) -> u64 {
        self.lock().used_total
    }

    /// Recomputes the accounting invariants from first principles. The
    /// returned report lets callers assert `used_bytes` and the LRU node
    /// count against the live entry set.
    pub fn audit(&self) -> AuditReport {
        let inner = self.lock();
        let recomputed: u64 = inner
            .namespaces
            .values()
            .flat_map(|ns| ns.entries.values())
            .map(Entry::size)
            .sum();
        let entries: usize = inner.namespaces.values().map(|ns| ns.entries.len()).sum();
        AuditReport {
            used_bytes: inner.used_total,
            recomputed_bytes: recomputed,
            entries,
            lru_nodes: inner.lru.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub used_bytes: u64,
    pub recomputed_bytes: u64,
    pub entries: usize,
    pub lru_nodes: usize,
}

impl EngineInner {
    fn namespace_mut(&mut self, name: &str) -> &mut NamespaceData {
        self.namespaces.entry(name.to_string()).or_default()
    }

    fn record_hit(&mut self, namespace: &str, metrics: &CacheMetrics) {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.hits += 1;
        }
        metrics.record_hit();
    }

    fn record_miss(&mut self, namespace: &str, metrics: &CacheMetrics) {
        if let Some(ns) = self.namespaces.get_mut(namespace) {
            ns.misses += 1;
        }
        metrics.record_miss();
    }

    /// Lazy expiry: drops the entry when its deadline has passed. Returns
    /// true when an entry was dropped.
    fn expire_if_due(
        &mut self,
        namespace: &str,
        key: &str,
        now: i64,
        metrics: &CacheMetrics,
        events: &EventBus,
    ) -> bool {
        let due = self
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key))
            .is_some_and(|entry| entry.is_expired(now));
        if due {
            self.drop_entry(namespace, key);
            metrics.record_expired_key();
            events.emit(CacheEvent::KeyExpire {
                namespace: namespace.to_string(),
                key: key.to_string(),
            });
        }
        due
    }

    /// Removes the entry, its accounting, and its LRU node.
    fn drop_entry(&mut self, namespace: &str, key: &str) -> Option<Entry> {
        let entry = self.remove_entry_only(namespace, key)?;
        self.lru.remove(namespace, key);
        Some(entry)
    }

    /// Removes the entry and accounting but leaves the LRU node to the
    /// caller (the eviction loop pops nodes itself).
    fn remove_entry_only(&mut self, namespace: &str, key: &str) -> Option<Entry> {
        let ns = self.namespaces.get_mut(namespace)?;
        let entry = ns.entries.remove(key)?;
        let size = entry.size();
        ns.used_bytes -= size;
        self.used_total -= size;
        Some(entry)
    }

    /// Installs an entry, then drains the LRU head until the budget holds.
    /// The triggering key is never evicted; when it alone cannot fit, the
    /// write rolls back and fails with `MemoryLimit`.
    fn commit_entry(
        &mut self,
        namespace: &str,
        key: &str,
        entry: Entry,
        max_bytes: u64,
        metrics: &CacheMetrics,
        events: &EventBus,
    ) -> CacheResult<()> {
        let new_size = entry.size();
        // An entry that cannot fit even in an empty engine fails up front,
        // before any neighbor is evicted on its behalf.
        if new_size > max_bytes {
            return Err(CacheError::MemoryLimit(format!(
                "entry of {new_size} bytes exceeds the {max_bytes}-byte budget"
            )));
        }
        let old = {
            let ns = self.namespace_mut(namespace);
            ns.entries.insert(key.to_string(), entry)
        };
        let old_size = old.as_ref().map(Entry::size).unwrap_or(0);

        {
            let ns = self.namespace_mut(namespace);
            ns.used_bytes = ns.used_bytes - old_size + new_size;
        }
        self.used_total = self.used_total - old_size + new_size;
        self.lru.touch(namespace, key);

        while self.used_total > max_bytes {
            let head = match self.lru.peek_head() {
                Some((ns, k)) => (ns.to_string(), k.to_string()),
                None => break,
            };
            if head.0 == namespace && head.1 == key {
                break;
            }
            self.lru.pop_head();
            // Drift (node without an entry) is removed and skipped.
            if self.remove_entry_only(&head.0, &head.1).is_some() {
                metrics.record_eviction();
                events.emit(CacheEvent::KeyEvict {
                    namespace: head.0,
                    key: head.1,
                });
            }
        }

        if self.used_total > max_bytes {
            let ns = self.namespace_mut(namespace);
            match old {
                Some(prev) => {
                    let prev_size = prev.size();
                    ns.entries.insert(key.to_string(), prev);
                    ns.used_bytes = ns.used_bytes - new_size + prev_size;
                    self.used_total = self.used_total - new_size + prev_size;
                }
                None => {
                    ns.entries.remove(key);
                    ns.used_bytes -= new_size;
                    self.used_total -= new_size;
                    self.lru.remove(namespace, key);
                }
            }
            return Err(CacheError::MemoryLimit(format!(
                "cannot fit {new_size} bytes within the memory budget"
            )));
        }

        events.emit(CacheEvent::KeySet {
            namespace: namespace.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn engine_with_budget(max_memory_bytes: u64) -> CacheEngine {
        CacheEngine::new(
            EngineConfig {
                max_memory_bytes,
                default_ttl_seconds: 0,
                max_ttl_seconds: 30 * 24 * 3600,
            },
            Arc::new(CacheMetrics::new()),
            Arc::new(EventBus::new()),
        )
    }

    pub fn engine() -> CacheEngine {
        engine_with_budget(256 * 1024 * 1024)
    }
}
