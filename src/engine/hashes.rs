use std::collections::BTreeMap;

use crate::engine::{CacheEngine, Kind, Value};
use crate::errors::{CacheError, CacheResult};

impl CacheEngine {
    /// `HSET` — returns 1 when the field is new, 0 when it was updated.
    pub fn hset(
        &self,
        namespace: &str,
        key: &str,
        field: String,
        value: String,
    ) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Hash, |v, _| {
            let Value::Hash(map) = v else {
                return Err(CacheError::invalid("expected a hash value"));
            };
            Ok(u64::from(map.insert(field, value).is_none()))
        })
    }

    /// `HMSET` — returns the number of newly created fields.
    pub fn hmset(
        &self,
        namespace: &str,
        key: &str,
        fields: BTreeMap<String, String>,
    ) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Hash, |v, _| {
            let Value::Hash(map) = v else {
                return Err(CacheError::invalid("expected a hash value"));
            };
            let mut added = 0;
            for (field, value) in fields {
                if map.insert(field, value).is_none() {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// `HGET`
    pub fn hget(&self, namespace: &str, key: &str, field: &str) -> CacheResult<Option<String>> {
        let found = self.read_value(namespace, key, Kind::Hash, |v| match v {
            Value::Hash(map) => map.get(field).cloned(),
            _ => None,
        })?;
        Ok(found.flatten())
    }

    /// `HGETALL` — the full field→value view.
    pub fn hgetall(
        &self,
        namespace: &str,
        key: &str,
    ) -> CacheResult<Option<BTreeMap<String, String>>> {
        self.read_value(namespace, key, Kind::Hash, |v| match v {
            Value::Hash(map) => map.clone(),
            _ => BTreeMap::new(),
        })
    }

    /// `HDEL` — returns the number of fields removed.
    pub fn hdel(&self, namespace: &str, key: &str, fields: &[String]) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Hash, |v, existed| {
            if !existed {
                return Ok(0);
            }
            let Value::Hash(map) = v else {
                return Err(CacheError::invalid("expected a hash value"));
            };
            Ok(fields
                .iter()
                .filter(|field| map.remove(field.as_str()).is_some())
                .count() as u64)
        })
    }

    /// `HINCRBY` — only integer-parsable fields are accepted.
    pub fn hincr_by(
        &self,
        namespace: &str,
        key: &str,
        field: String,
        by: i64,
    ) -> CacheResult<i64> {
        self.mutate_value(namespace, key, Kind::Hash, |v, _| {
            let Value::Hash(map) = v else {
                return Err(CacheError::invalid("expected a hash value"));
            };
            let current: i64 = match map.get(&field) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| CacheError::invalid("hash field is not an integer"))?,
                None => 0,
            };
            let next = current
                .checked_add(by)
                .ok_or_else(|| CacheError::invalid("increment would overflow"))?;
            map.insert(field, next.to_string());
            Ok(next)
        })
    }

    /// `HLEN`
    pub fn hlen(&self, namespace: &str, key: &str) -> CacheResult<u64> {
        let len = self.read_value(namespace, key, Kind::Hash, |v| match v {
            Value::Hash(map) => map.len() as u64,
            _ => 0,
        })?;
        Ok(len.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;

    #[test]
    fn test_hset_returns_one_for_new_field() {
        let engine = engine();
        assert_eq!(engine.hset("default", "h", "f".into(), "v1".into()).unwrap(), 1);
        assert_eq!(engine.hset("default", "h", "f".into(), "v2".into()).unwrap(), 0);
        assert_eq!(
            engine.hget("default", "h", "f").unwrap(),
            Some("v2".to_string())
        );
    }

    #[test]
    fn test_hgetall_returns_full_view() {
        let engine = engine();
        engine.hset("default", "h", "a".into(), "1".into()).unwrap();
        engine.hset("default", "h", "b".into(), "2".into()).unwrap();

        let all = engine.hgetall("default", "h").unwrap().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a"), Some(&"1".to_string()));
        assert_eq!(all.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn test_hgetall_missing_key_is_none() {
        let engine = engine();
        assert_eq!(engine.hgetall("default", "missing").unwrap(), None);
    }

    #[test]
    fn test_hdel_removes_fields_and_drains_key() {
        let engine = engine();
        engine.hset("default", "h", "a".into(), "1".into()).unwrap();
        engine.hset("default", "h", "b".into(), "2".into()).unwrap();

        let removed = engine
            .hdel("default", "h", &["a".to_string(), "zzz".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(engine.hlen("default", "h").unwrap(), 1);

        engine.hdel("default", "h", &["b".to_string()]).unwrap();
        // Draining the last field deletes the key entirely.
        assert_eq!(engine.exists("default", &["h".to_string()]), 0);
    }

    #[test]
    fn test_hincrby_rejects_non_integer_field() {
        let engine = engine();
        engine
            .hset("default", "h", "f".into(), "abc".into())
            .unwrap();
        let err = engine.hincr_by("default", "h", "f".into(), 2).unwrap_err();
        assert_eq!(err.code(), "INVALID_OPERATION");
    }

    #[test]
    fn test_hincrby_counts_from_zero() {
        let engine = engine();
        assert_eq!(engine.hincr_by("default", "h", "n".into(), 7).unwrap(), 7);
        assert_eq!(engine.hincr_by("default", "h", "n".into(), -3).unwrap(), 4);
    }

    #[test]
    fn test_hset_on_string_key_fails() {
        let engine = engine();
        engine
            .set("default", "k", "v".into(), Default::default())
            .unwrap();
        let err = engine
            .hset("default", "k", "f".into(), "v".into())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_OPERATION");
    }
}
