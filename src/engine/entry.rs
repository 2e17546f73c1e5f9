use serde::{Deserialize, Serialize};

/// Sentinel for "no expiry".
pub const NO_EXPIRY: i64 = i64::MAX;

/// Immutable type tag of an entry. The tag is fixed at creation; commands
/// targeting an entry of the wrong kind fail with `InvalidOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    String,
    Hash,
    List,
    Set,
    Zset,
    Stream,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Hash => "hash",
            Kind::List => "list",
            Kind::Set => "set",
            Kind::Zset => "zset",
            Kind::Stream => "stream",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value in a namespace. `data` is the byte-serialized payload; size
/// accounting uses `data.len()` exclusively.
#[derive(Debug, Clone)]
pub struct Entry {
    pub data: Vec<u8>,
    pub kind: Kind,
    pub created_at: i64,
    pub expires_at: i64,
    pub last_accessed_at: i64,
    pub access_count: u64,
}

impl Entry {
    pub fn new(data: Vec<u8>, kind: Kind, now: i64, expires_at: i64) -> Self {
        Self {
            data,
            kind,
            created_at: now,
            expires_at,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }

    pub fn has_expiry(&self) -> bool {
        self.expires_at != NO_EXPIRY
    }

    pub fn touch(&mut self, now: i64) {
        self.last_accessed_at = now;
        self.access_count += 1;
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
