use serde::Serialize;

use crate::engine::{now_ms, CacheEngine, NO_EXPIRY};
use crate::errors::{CacheError, CacheResult};
use crate::events::CacheEvent;
use crate::glob::glob_to_regex;

/// One page of a `SCAN`: the next cursor ("0" when done) plus keys.
#[derive(Debug, Clone, Serialize)]
pub struct ScanPage {
    pub cursor: String,
    pub keys: Vec<String>,
}

impl CacheEngine {
    /// `KEYS` — live keys matching the glob, in sorted order.
    pub fn keys(&self, namespace: &str, pattern: &str) -> Vec<String> {
        let re = glob_to_regex(pattern);
        let inner = self.lock();
        let now = now_ms();
        let mut keys: Vec<String> = inner
            .namespaces
            .get(namespace)
            .map(|ns| {
                ns.entries
                    .iter()
                    .filter(|(key, entry)| !entry.is_expired(now) && re.is_match(key))
                    .map(|(key, _)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// `SCAN` — deterministic ordered listing; the cursor is the next offset
    /// as a decimal string and `"0"` signals completion.
    pub fn scan(
        &self,
        namespace: &str,
        cursor: &str,
        pattern: &str,
        count: usize,
    ) -> CacheResult<ScanPage> {
        let offset: usize = cursor
            .parse()
            .map_err(|_| CacheError::invalid("cursor must be a decimal offset"))?;
        let count = count.max(1);

        let all = self.keys(namespace, pattern);
        let page: Vec<String> = all.iter().skip(offset).take(count).cloned().collect();
        let next = offset + page.len();
        let cursor = if next >= all.len() {
            "0".to_string()
        } else {
            next.to_string()
        };
        Ok(ScanPage { cursor, keys: page })
    }

    /// `TYPE` — the kind tag, or "none" for missing/expired keys.
    pub fn key_type(&self, namespace: &str, key: &str) -> &'static str {
        let inner = self.lock();
        let now = now_ms();
        inner
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key))
            .filter(|entry| !entry.is_expired(now))
            .map_or("none", |entry| entry.kind.as_str())
    }

    /// `RENAME` — moves the bytes as-is (even across kinds); TTL and size
    /// carry over and the renamed key enters the LRU tail. Returns false
    /// when the source is missing.
    pub fn rename(&self, namespace: &str, old: &str, new: &str) -> CacheResult<bool> {
        if old == new {
            return Ok(true);
        }
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, old, now, &self.metrics, &self.events);

        let Some(entry) = inner.drop_entry(namespace, old) else {
            return Ok(false);
        };
        if inner.drop_entry(namespace, new).is_some() {
            self.events.emit(CacheEvent::KeyDelete {
                namespace: namespace.to_string(),
                key: new.to_string(),
            });
        }
        inner.commit_entry(
            namespace,
            new,
            entry,
            self.config.max_memory_bytes,
            &self.metrics,
            &self.events,
        )?;
        self.events.emit(CacheEvent::KeyDelete {
            namespace: namespace.to_string(),
            key: old.to_string(),
        });
        Ok(true)
    }

    /// `EXPIRE` — sets a relative TTL in seconds. Returns false when the
    /// key is missing.
    pub fn expire(&self, namespace: &str, key: &str, seconds: u64) -> CacheResult<bool> {
        let now = now_ms();
        let expires_at = self.expiry_from_ttl(Some(seconds), now)?;
        self.set_expiry(namespace, key, now, expires_at)
    }

    /// `EXPIREAT` — absolute deadline in epoch milliseconds.
    pub fn expire_at(&self, namespace: &str, key: &str, at_ms: i64) -> CacheResult<bool> {
        self.set_expiry(namespace, key, now_ms(), at_ms)
    }

    /// `PERSIST` — drops the expiry. Returns false when the key is missing
    /// or had none.
    pub fn persist(&self, namespace: &str, key: &str) -> CacheResult<bool> {
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        let Some(entry) = inner
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.entries.get_mut(key))
        else {
            return Ok(false);
        };
        if !entry.has_expiry() {
            return Ok(false);
        }
        entry.expires_at = NO_EXPIRY;
        Ok(true)
    }

    /// `TTL` — `-2` when absent, `-1` when no expiry, else the remaining
    /// whole seconds (rounded up so a live key never reports 0).
    pub fn ttl(&self, namespace: &str, key: &str) -> i64 {
        match self.pttl(namespace, key) {
            ms if ms < 0 => ms,
            ms => (ms + 999) / 1000,
        }
    }

    /// `PTTL` — same contract in milliseconds.
    pub fn pttl(&self, namespace: &str, key: &str) -> i64 {
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        match inner
            .namespaces
            .get(namespace)
            .and_then(|ns| ns.entries.get(key))
        {
            None => -2,
            Some(entry) if !entry.has_expiry() => -1,
            Some(entry) => (entry.expires_at - now).max(0),
        }
    }

    fn set_expiry(
        &self,
        namespace: &str,
        key: &str,
        now: i64,
        expires_at: i64,
    ) -> CacheResult<bool> {
        let mut inner = self.lock();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        let Some(entry) = inner
            .namespaces
            .get_mut(namespace)
            .and_then(|ns| ns.entries.get_mut(key))
        else {
            return Ok(false);
        };
        entry.expires_at = expires_at;
        Ok(true)
    }
}
