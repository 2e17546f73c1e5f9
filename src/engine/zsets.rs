use crate::engine::lists::normalize_range;
use crate::engine::value::zset_insert;
use crate::engine::{CacheEngine, Kind, Value, ZsetMember};
use crate::errors::{CacheError, CacheResult};

impl CacheEngine {
    /// `ZADD` — replaces the score when the member exists; the return value
    /// counts only additions.
    pub fn zadd(
        &self,
        namespace: &str,
        key: &str,
        members: Vec<ZsetMember>,
    ) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Zset, |v, _| {
            let Value::Zset(zset) = v else {
                return Err(CacheError::invalid("expected a sorted-set value"));
            };
            let mut added = 0;
            for ZsetMember { member, score } in members {
                match zset.iter().position(|m| m.member == member) {
                    Some(pos) => {
                        zset.remove(pos);
                    }
                    None => added += 1,
                }
                zset_insert(zset, member, score);
            }
            Ok(added)
        })
    }

    /// `ZRANGE` — positional indices, inclusive; negatives from the end.
    pub fn zrange(
        &self,
        namespace: &str,
        key: &str,
        start: i64,
        stop: i64,
    ) -> CacheResult<Vec<ZsetMember>> {
        let page = self.read_value(namespace, key, Kind::Zset, |v| {
            let Value::Zset(zset) = v else {
                return Vec::new();
            };
            match normalize_range(start, stop, zset.len()) {
                Some((from, to)) => zset[from..=to].to_vec(),
                None => Vec::new(),
            }
        })?;
        Ok(page.unwrap_or_default())
    }

    /// `ZRANGEBYSCORE` — inclusive on both ends.
    pub fn zrange_by_score(
        &self,
        namespace: &str,
        key: &str,
        min: f64,
        max: f64,
    ) -> CacheResult<Vec<ZsetMember>> {
        let page = self.read_value(namespace, key, Kind::Zset, |v| {
            let Value::Zset(zset) = v else {
                return Vec::new();
            };
            zset.iter()
                .filter(|m| m.score >= min && m.score <= max)
                .cloned()
                .collect()
        })?;
        Ok(page.unwrap_or_default())
    }

    /// `ZREM` — removes by member identity; returns the removed count.
    pub fn zrem(&self, namespace: &str, key: &str, members: &[String]) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Zset, |v, existed| {
            if !existed {
                return Ok(0);
            }
            let Value::Zset(zset) = v else {
                return Err(CacheError::invalid("expected a sorted-set value"));
            };
            let before = zset.len();
            zset.retain(|m| !members.contains(&m.member));
            Ok((before - zset.len()) as u64)
        })
    }

    /// `ZSCORE`
    pub fn zscore(&self, namespace: &str, key: &str, member: &str) -> CacheResult<Option<f64>> {
        let score = self.read_value(namespace, key, Kind::Zset, |v| {
            let Value::Zset(zset) = v else {
                return None;
            };
            zset.iter().find(|m| m.member == member).map(|m| m.score)
        })?;
        Ok(score.flatten())
    }

    /// `ZCARD`
    pub fn zcard(&self, namespace: &str, key: &str) -> CacheResult<u64> {
        let card = self.read_value(namespace, key, Kind::Zset, |v| match v {
            Value::Zset(zset) => zset.len() as u64,
            _ => 0,
        })?;
        Ok(card.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;

    fn zm(member: &str, score: f64) -> ZsetMember {
        ZsetMember {
            member: member.to_string(),
            score,
        }
    }

    fn member_names(members: &[ZsetMember]) -> Vec<&str> {
        members.iter().map(|m| m.member.as_str()).collect()
    }

    #[test]
    fn test_zadd_sorts_ascending_with_stable_ties() {
        let engine = engine();
        engine
            .zadd(
                "default",
                "z",
                vec![zm("m1", 1.0), zm("m2", 2.0), zm("m3", 2.0), zm("m4", 3.0)],
            )
            .unwrap();

        let all = engine.zrange("default", "z", 0, -1).unwrap();
        assert_eq!(member_names(&all), vec!["m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn test_zadd_replaces_score_without_counting() {
        let engine = engine();
        assert_eq!(engine.zadd("default", "z", vec![zm("m", 1.0)]).unwrap(), 1);
        assert_eq!(engine.zadd("default", "z", vec![zm("m", 9.0)]).unwrap(), 0);
        assert_eq!(engine.zscore("default", "z", "m").unwrap(), Some(9.0));
        assert_eq!(engine.zcard("default", "z").unwrap(), 1);
    }

    #[test]
    fn test_zrange_by_score_is_inclusive() {
        let engine = engine();
        engine
            .zadd(
                "default",
                "z",
                vec![zm("m1", 1.0), zm("m2", 2.0), zm("m3", 2.0), zm("m4", 3.0)],
            )
            .unwrap();

        let mid = engine.zrange_by_score("default", "z", 2.0, 2.0).unwrap();
        assert_eq!(member_names(&mid), vec!["m2", "m3"]);
    }

    #[test]
    fn test_zrem_removes_by_identity() {
        let engine = engine();
        engine
            .zadd("default", "z", vec![zm("a", 1.0), zm("b", 2.0)])
            .unwrap();
        assert_eq!(
            engine.zrem("default", "z", &["a".to_string()]).unwrap(),
            1
        );
        assert_eq!(engine.zscore("default", "z", "a").unwrap(), None);

        engine.zrem("default", "z", &["b".to_string()]).unwrap();
        assert_eq!(engine.exists("default", &["z".to_string()]), 0);
    }

    #[test]
    fn test_zrange_positional_negative_indices() {
        let engine = engine();
        engine
            .zadd(
                "default",
                "z",
                vec![zm("a", 1.0), zm("b", 2.0), zm("c", 3.0)],
            )
            .unwrap();
        let last_two = engine.zrange("default", "z", -2, -1).unwrap();
        assert_eq!(member_names(&last_two), vec!["b", "c"]);
    }
}
