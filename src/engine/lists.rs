use crate::engine::{CacheEngine, Kind, Value};
use crate::errors::{CacheError, CacheResult};

/// Redis-style inclusive range indices; negatives count from the end.
/// Returns `None` when the normalized window is empty.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl CacheEngine {
    /// `LPUSH` — prepends values one by one; returns the new length.
    pub fn lpush(&self, namespace: &str, key: &str, values: Vec<String>) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::List, |v, _| {
            let Value::List(list) = v else {
                return Err(CacheError::invalid("expected a list value"));
            };
            for value in values {
                list.push_front(value);
            }
            Ok(list.len() as u64)
        })
    }

    /// `RPUSH` — appends values; returns the new length.
    pub fn rpush(&self, namespace: &str, key: &str, values: Vec<String>) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::List, |v, _| {
            let Value::List(list) = v else {
                return Err(CacheError::invalid("expected a list value"));
            };
            for value in values {
                list.push_back(value);
            }
            Ok(list.len() as u64)
        })
    }

    /// `LPOP`
    pub fn lpop(&self, namespace: &str, key: &str) -> CacheResult<Option<String>> {
        self.mutate_value(namespace, key, Kind::List, |v, existed| {
            if !existed {
                return Ok(None);
            }
            let Value::List(list) = v else {
                return Err(CacheError::invalid("expected a list value"));
            };
            Ok(list.pop_front())
        })
    }

    /// `RPOP`
    pub fn rpop(&self, namespace: &str, key: &str) -> CacheResult<Option<String>> {
        self.mutate_value(namespace, key, Kind::List, |v, existed| {
            if !existed {
                return Ok(None);
            }
            let Value::List(list) = v else {
                return Err(CacheError::invalid("expected a list value"));
            };
            Ok(list.pop_back())
        })
    }

    /// `LRANGE` — inclusive indices, negatives from the end.
    pub fn lrange(
        &self,
        namespace: &str,
        key: &str,
        start: i64,
        stop: i64,
    ) -> CacheResult<Vec<String>> {
        let page = self.read_value(namespace, key, Kind::List, |v| {
            let Value::List(list) = v else {
                return Vec::new();
            };
            match normalize_range(start, stop, list.len()) {
                Some((from, to)) => list.iter().skip(from).take(to - from + 1).cloned().collect(),
                None => Vec::new(),
            }
        })?;
        Ok(page.unwrap_or_default())
    }

    /// `LLEN`
    pub fn llen(&self, namespace: &str, key: &str) -> CacheResult<u64> {
        let len = self.read_value(namespace, key, Kind::List, |v| match v {
            Value::List(list) => list.len() as u64,
            _ => 0,
        })?;
        Ok(len.unwrap_or(0))
    }

    /// `LTRIM` — retains the inclusive slice; an out-of-range window leaves
    /// an empty list (which deletes the key).
    pub fn ltrim(&self, namespace: &str, key: &str, start: i64, stop: i64) -> CacheResult<()> {
        self.mutate_value(namespace, key, Kind::List, |v, existed| {
            if !existed {
                return Ok(());
            }
            let Value::List(list) = v else {
                return Err(CacheError::invalid("expected a list value"));
            };
            match normalize_range(start, stop, list.len()) {
                Some((from, to)) => {
                    let retained: std::collections::VecDeque<String> =
                        list.iter().skip(from).take(to - from + 1).cloned().collect();
                    *list = retained;
                }
                None => list.clear(),
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;

    fn push_abc(engine: &crate::engine::CacheEngine, key: &str, right: bool) {
        let values = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        if right {
            engine.rpush("default", key, values).unwrap();
        } else {
            engine.lpush("default", key, values).unwrap();
        }
    }

    #[test]
    fn test_lpush_reverses_order() {
        let engine = engine();
        push_abc(&engine, "l", false);
        assert_eq!(
            engine.lrange("default", "l", 0, -1).unwrap(),
            vec!["c", "b", "a"]
        );
    }

    #[test]
    fn test_rpush_keeps_order() {
        let engine = engine();
        push_abc(&engine, "l", true);
        assert_eq!(
            engine.lrange("default", "l", 0, -1).unwrap(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn test_pops_from_both_ends() {
        let engine = engine();
        push_abc(&engine, "l", true);
        assert_eq!(engine.lpop("default", "l").unwrap(), Some("a".to_string()));
        assert_eq!(engine.rpop("default", "l").unwrap(), Some("c".to_string()));
        assert_eq!(engine.llen("default", "l").unwrap(), 1);
    }

    #[test]
    fn test_pop_empty_key_is_none() {
        let engine = engine();
        assert_eq!(engine.lpop("default", "missing").unwrap(), None);
    }

    #[test]
    fn test_lrange_negative_indices() {
        let engine = engine();
        engine
            .rpush(
                "default",
                "l",
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
            )
            .unwrap();
        assert_eq!(
            engine.lrange("default", "l", -2, -1).unwrap(),
            vec!["c", "d"]
        );
        assert_eq!(engine.lrange("default", "l", 1, 2).unwrap(), vec!["b", "c"]);
        assert!(engine.lrange("default", "l", 5, 9).unwrap().is_empty());
    }

    #[test]
    fn test_ltrim_retains_slice() {
        let engine = engine();
        engine
            .rpush(
                "default",
                "l",
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
            )
            .unwrap();
        engine.ltrim("default", "l", 1, 2).unwrap();
        assert_eq!(engine.lrange("default", "l", 0, -1).unwrap(), vec!["b", "c"]);
    }

    #[test]
    fn test_ltrim_out_of_range_empties_list() {
        let engine = engine();
        push_abc(&engine, "l", true);
        engine.ltrim("default", "l", 10, 20).unwrap();
        assert!(engine.lrange("default", "l", 0, -1).unwrap().is_empty());
        assert_eq!(engine.exists("default", &["l".to_string()]), 0);
    }

    #[test]
    fn test_normalize_range_edges() {
        assert_eq!(normalize_range(0, -1, 3), Some((0, 2)));
        assert_eq!(normalize_range(-2, -1, 3), Some((1, 2)));
        assert_eq!(normalize_range(2, 1, 3), None);
        assert_eq!(normalize_range(0, 10, 3), Some((0, 2)));
        assert_eq!(normalize_range(0, 0, 0), None);
    }
}
