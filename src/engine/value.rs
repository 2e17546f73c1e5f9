use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::engine::entry::Kind;
use crate::errors::{CacheError, CacheResult};

/// A sorted-set member. The containing vector is kept sorted by ascending
/// score; members with equal scores stay in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZsetMember {
    pub member: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: String,
    pub fields: BTreeMap<String, String>,
}

/// Decoded view over an entry's payload. Strings are stored as their raw
/// bytes; every other kind round-trips through JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Zset(Vec<ZsetMember>),
    Stream(Vec<StreamEntry>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::String,
            Value::Hash(_) => Kind::Hash,
            Value::List(_) => Kind::List,
            Value::Set(_) => Kind::Set,
            Value::Zset(_) => Kind::Zset,
            Value::Stream(_) => Kind::Stream,
        }
    }

    pub fn empty(kind: Kind) -> Self {
        match kind {
            Kind::String => Value::Str(String::new()),
            Kind::Hash => Value::Hash(BTreeMap::new()),
            Kind::List => Value::List(VecDeque::new()),
            Kind::Set => Value::Set(BTreeSet::new()),
            Kind::Zset => Value::Zset(Vec::new()),
            Kind::Stream => Value::Stream(Vec::new()),
        }
    }

    /// True when a collection holds no members. Strings are never "empty"
    /// for lifecycle purposes; an empty string is a live value.
    pub fn is_drained(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::Hash(m) => m.is_empty(),
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Zset(z) => z.is_empty(),
            Value::Stream(s) => s.is_empty(),
        }
    }

    pub fn encode(&self) -> CacheResult<Vec<u8>> {
        match self {
            Value::Str(s) => Ok(s.clone().into_bytes()),
            Value::Hash(m) => Ok(serde_json::to_vec(m)?),
            Value::List(l) => Ok(serde_json::to_vec(l)?),
            Value::Set(s) => Ok(serde_json::to_vec(s)?),
            Value::Zset(z) => Ok(serde_json::to_vec(z)?),
            Value::Stream(s) => Ok(serde_json::to_vec(s)?),
        }
    }

    pub fn decode(kind: Kind, data: &[u8]) -> CacheResult<Self> {
        match kind {
            Kind::String => String::from_utf8(data.to_vec())
                .map(Value::Str)
                .map_err(|_| CacheError::invalid("value is not valid utf-8")),
            Kind::Hash => Ok(Value::Hash(serde_json::from_slice(data)?)),
            Kind::List => Ok(Value::List(serde_json::from_slice(data)?)),
            Kind::Set => Ok(Value::Set(serde_json::from_slice(data)?)),
            Kind::Zset => Ok(Value::Zset(serde_json::from_slice(data)?)),
            Kind::Stream => Ok(Value::Stream(serde_json::from_slice(data)?)),
        }
    }
}

/// Inserts into a score-sorted vector keeping equal scores in arrival order.
pub fn zset_insert(members: &mut Vec<ZsetMember>, member: String, score: f64) {
    let pos = members.partition_point(|m| m.score <= score);
    members.insert(pos, ZsetMember { member, score });
}
