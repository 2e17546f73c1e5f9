use crate::engine::{now_ms, CacheEngine, Entry, Kind, Value};
use crate::errors::{CacheError, CacheResult};
use crate::events::CacheEvent;

/// Flags accepted by `SET`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Fail (return false) when the key already exists.
    pub nx: bool,
    /// Fail (return false) when the key is absent.
    pub xx: bool,
    /// TTL in seconds; `None` takes the default, 0 stores forever.
    pub ttl: Option<u64>,
}

impl CacheEngine {
    /// `GET` — returns the string value, or `None` on miss.
    pub fn get(&self, namespace: &str, key: &str) -> CacheResult<Option<String>> {
        self.read_value(namespace, key, Kind::String, |value| match value {
            Value::Str(s) => s.clone(),
            _ => String::new(),
        })
    }

    /// `SET` — stores a string, honoring `NX`/`XX`/`TTL`. Returns false when
    /// an `NX`/`XX` precondition failed (the value is left unchanged).
    pub fn set(
        &self,
        namespace: &str,
        key: &str,
        value: String,
        opts: SetOptions,
    ) -> CacheResult<bool> {
        let mut inner = self.lock();
        let now = now_ms();
        inner.expire_if_due(namespace, key, now, &self.metrics, &self.events);

        let exists = inner
            .namespaces
            .get(namespace)
            .is_some_and(|ns| ns.entries.contains_key(key));
        if (opts.nx && exists) || (opts.xx && !exists) {
            return Ok(false);
        }

        let expires_at = self.expiry_from_ttl(opts.ttl, now)?;
        let entry = Entry::new(value.into_bytes(), Kind::String, now, expires_at);
        inner.commit_entry(
            namespace,
            key,
            entry,
            self.config.max_memory_bytes,
            &self.metrics,
            &self.events,
        )?;
        Ok(true)
    }

    /// `DEL` — returns the number of keys actually deleted.
    pub fn del(&self, namespace: &str, keys: &[String]) -> usize {
        let mut inner = self.lock();
        let now = now_ms();
        let mut deleted = 0;
        for key in keys {
            if inner.expire_if_due(namespace, key, now, &self.metrics, &self.events) {
                continue;
            }
            if inner.drop_entry(namespace, key).is_some() {
                deleted += 1;
                self.events.emit(CacheEvent::KeyDelete {
                    namespace: namespace.to_string(),
                    key: key.clone(),
                });
            }
        }
        deleted
    }

    /// `EXISTS` — counts keys that are live and not expired.
    pub fn exists(&self, namespace: &str, keys: &[String]) -> usize {
        let mut inner = self.lock();
        let now = now_ms();
        keys.iter()
            .filter(|key| {
                !inner.expire_if_due(namespace, key, now, &self.metrics, &self.events)
                    && inner
                        .namespaces
                        .get(namespace)
                        .is_some_and(|ns| ns.entries.contains_key(key.as_str()))
            })
            .count()
    }

    /// `INCRBY` / `DECRBY` — rewrites the string form of the counter.
    pub fn incr_by(&self, namespace: &str, key: &str, by: i64) -> CacheResult<i64> {
        self.mutate_value(namespace, key, Kind::String, |value, existed| {
            let Value::Str(s) = value else {
                return Err(CacheError::invalid("expected a string value"));
            };
            let current: i64 = if existed {
                s.parse()
                    .map_err(|_| CacheError::invalid("value is not an integer"))?
            } else {
                0
            };
            let next = current
                .checked_add(by)
                .ok_or_else(|| CacheError::invalid("increment would overflow"))?;
            *s = next.to_string();
            Ok(next)
        })
    }

    /// `APPEND` — concatenates, keeping the existing TTL. Returns the new
    /// length.
    pub fn append(&self, namespace: &str, key: &str, suffix: &str) -> CacheResult<usize> {
        self.mutate_value(namespace, key, Kind::String, |value, _| {
            let Value::Str(s) = value else {
                return Err(CacheError::invalid("expected a string value"));
            };
            s.push_str(suffix);
            Ok(s.len())
        })
    }

    /// `MGET` — per-key reads; no cross-key atomicity.
    pub fn mget(&self, namespace: &str, keys: &[String]) -> CacheResult<Vec<Option<String>>> {
        keys.iter()
            .map(|key| self.get(namespace, key))
            .collect()
    }

    /// `MSET` — per-key writes with default TTL; no cross-key atomicity.
    pub fn mset(&self, namespace: &str, pairs: &[(String, String)]) -> CacheResult<usize> {
        let mut written = 0;
        for (key, value) in pairs {
            if self.set(namespace, key, value.clone(), SetOptions::default())? {
                written += 1;
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;

    #[test]
    fn test_set_get_roundtrip() {
        let engine = engine();
        assert!(engine
            .set("default", "k", "v".into(), SetOptions::default())
            .unwrap());
        assert_eq!(engine.get("default", "k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_get_missing_is_none() {
        let engine = engine();
        assert_eq!(engine.get("default", "nope").unwrap(), None);
    }

    #[test]
    fn test_set_nx_leaves_existing_value() {
        let engine = engine();
        engine
            .set("default", "k", "first".into(), SetOptions::default())
            .unwrap();
        let stored = engine
            .set(
                "default",
                "k",
                "second".into(),
                SetOptions {
                    nx: true,
                    ..SetOptions::default()
                },
            )
            .unwrap();
        assert!(!stored);
        assert_eq!(
            engine.get("default", "k").unwrap(),
            Some("first".to_string())
        );
    }

    #[test]
    fn test_set_xx_requires_existing_key() {
        let engine = engine();
        let stored = engine
            .set(
                "default",
                "k",
                "v".into(),
                SetOptions {
                    xx: true,
                    ..SetOptions::default()
                },
            )
            .unwrap();
        assert!(!stored);
        assert_eq!(engine.get("default", "k").unwrap(), None);
    }

    #[test]
    fn test_incr_and_decr() {
        let engine = engine();
        assert_eq!(engine.incr_by("default", "n", 1).unwrap(), 1);
        assert_eq!(engine.incr_by("default", "n", 5).unwrap(), 6);
        assert_eq!(engine.incr_by("default", "n", -2).unwrap(), 4);
        assert_eq!(engine.get("default", "n").unwrap(), Some("4".to_string()));
    }

    #[test]
    fn test_incr_on_non_integer_fails() {
        let engine = engine();
        engine
            .set("default", "k", "abc".into(), SetOptions::default())
            .unwrap();
        let err = engine.incr_by("default", "k", 1).unwrap_err();
        assert_eq!(err.code(), "INVALID_OPERATION");
    }

    #[test]
    fn test_append_keeps_value_growing() {
        let engine = engine();
        assert_eq!(engine.append("default", "k", "foo").unwrap(), 3);
        assert_eq!(engine.append("default", "k", "bar").unwrap(), 6);
        assert_eq!(
            engine.get("default", "k").unwrap(),
            Some("foobar".to_string())
        );
    }

    #[test]
    fn test_del_counts_only_deleted() {
        let engine = engine();
        engine
            .set("default", "a", "1".into(), SetOptions::default())
            .unwrap();
        let n = engine.del("default", &["a".to_string(), "missing".to_string()]);
        assert_eq!(n, 1);
        assert_eq!(engine.exists("default", &["a".to_string()]), 0);
    }

    #[test]
    fn test_mset_mget() {
        let engine = engine();
        let pairs = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];
        assert_eq!(engine.mset("default", &pairs).unwrap(), 2);

        let values = engine
            .mget(
                "default",
                &["a".to_string(), "missing".to_string(), "b".to_string()],
            )
            .unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("2".to_string())]
        );
    }
}
