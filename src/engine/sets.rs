use rand::Rng;

use crate::engine::{CacheEngine, Kind, Value};
use crate::errors::{CacheError, CacheResult};

impl CacheEngine {
    /// `SADD` — returns the number of members that were new.
    pub fn sadd(&self, namespace: &str, key: &str, members: Vec<String>) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Set, |v, _| {
            let Value::Set(set) = v else {
                return Err(CacheError::invalid("expected a set value"));
            };
            Ok(members
                .into_iter()
                .filter(|member| set.insert(member.clone()))
                .count() as u64)
        })
    }

    /// `SREM` — returns the number of members removed.
    pub fn srem(&self, namespace: &str, key: &str, members: &[String]) -> CacheResult<u64> {
        self.mutate_value(namespace, key, Kind::Set, |v, existed| {
            if !existed {
                return Ok(0);
            }
            let Value::Set(set) = v else {
                return Err(CacheError::invalid("expected a set value"));
            };
            Ok(members
                .iter()
                .filter(|member| set.remove(member.as_str()))
                .count() as u64)
        })
    }

    /// `SMEMBERS`
    pub fn smembers(&self, namespace: &str, key: &str) -> CacheResult<Vec<String>> {
        let members = self.read_value(namespace, key, Kind::Set, |v| match v {
            Value::Set(set) => set.iter().cloned().collect(),
            _ => Vec::new(),
        })?;
        Ok(members.unwrap_or_default())
    }

    /// `SISMEMBER`
    pub fn sismember(&self, namespace: &str, key: &str, member: &str) -> CacheResult<bool> {
        let found = self.read_value(namespace, key, Kind::Set, |v| match v {
            Value::Set(set) => set.contains(member),
            _ => false,
        })?;
        Ok(found.unwrap_or(false))
    }

    /// `SCARD`
    pub fn scard(&self, namespace: &str, key: &str) -> CacheResult<u64> {
        let card = self.read_value(namespace, key, Kind::Set, |v| match v {
            Value::Set(set) => set.len() as u64,
            _ => 0,
        })?;
        Ok(card.unwrap_or(0))
    }

    /// `SPOP` — removes and returns a uniformly random member. The
    /// randomness source is not cryptographic.
    pub fn spop(&self, namespace: &str, key: &str) -> CacheResult<Option<String>> {
        self.mutate_value(namespace, key, Kind::Set, |v, existed| {
            if !existed {
                return Ok(None);
            }
            let Value::Set(set) = v else {
                return Err(CacheError::invalid("expected a set value"));
            };
            if set.is_empty() {
                return Ok(None);
            }
            let idx = rand::thread_rng().gen_range(0..set.len());
            let member = set.iter().nth(idx).cloned();
            if let Some(ref m) = member {
                set.remove(m);
            }
            Ok(member)
        })
    }

    /// `SRANDMEMBER` — selects without removing.
    pub fn srandmember(&self, namespace: &str, key: &str) -> CacheResult<Option<String>> {
        let member = self.read_value(namespace, key, Kind::Set, |v| {
            let Value::Set(set) = v else {
                return None;
            };
            if set.is_empty() {
                return None;
            }
            let idx = rand::thread_rng().gen_range(0..set.len());
            set.iter().nth(idx).cloned()
        })?;
        Ok(member.flatten())
    }
}
