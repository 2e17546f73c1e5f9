use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-global cache counters. Gauges (key count, memory, instances,
/// nodes) are computed by the caller at render time.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_keys: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_key(&self) {
        self.expired_keys.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expired_keys(&self) -> u64 {
        self.expired_keys.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Point-in-time snapshot rendered at `/cache/metrics` and `/cache/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub keys_total: u64,
    pub memory_bytes: u64,
    pub hits_total: u64,
    pub misses_total: u64,
    pub hit_rate: f64,
    pub evictions_total: u64,
    pub expired_keys_total: u64,
    pub uptime_seconds: u64,
    pub instances_total: u64,
    pub nodes_total: u64,
    pub tee_instances: u64,
}

/// Renders the snapshot in the Prometheus text exposition format.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::with_capacity(1024);

    let mut series = |name: &str, kind: &str, help: &str, value: String| {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} {kind}\n"));
        out.push_str(&format!("{name} {value}\n"));
    };

    series(
        "cache_keys_total",
        "gauge",
        "Live keys across all namespaces",
        snapshot.keys_total.to_string(),
    );
    series(
        "cache_memory_bytes",
        "gauge",
        "Bytes accounted against the memory budget",
        snapshot.memory_bytes.to_string(),
    );
    series(
        "cache_hits_total",
        "counter",
        "Read operations that found a live entry",
        snapshot.hits_total.to_string(),
    );
    series(
        "cache_misses_total",
        "counter",
        "Read operations that found nothing",
        snapshot.misses_total.to_string(),
    );
    series(
        "cache_hit_rate",
        "gauge",
        "hits / (hits + misses)",
        format!("{:.4}", snapshot.hit_rate),
    );
    series(
        "cache_evictions_total",
        "counter",
        "Entries evicted by the LRU loop",
        snapshot.evictions_total.to_string(),
    );
    series(
        "cache_expired_keys_total",
        "counter",
        "Entries removed by TTL expiry",
        snapshot.expired_keys_total.to_string(),
    );
    series(
        "cache_uptime_seconds",
        "counter",
        "Seconds since process start",
        snapshot.uptime_seconds.to_string(),
    );
    series(
        "cache_instances_total",
        "gauge",
        "Provisioned instances",
        snapshot.instances_total.to_string(),
    );
    series(
        "cache_nodes_total",
        "gauge",
        "Pods with a live registry heartbeat",
        snapshot.nodes_total.to_string(),
    );
    series(
        "cache_tee_instances",
        "gauge",
        "Provisioned instances backed by a TEE engine",
        snapshot.tee_instances.to_string(),
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.hit_rate(), 0.0);

        for _ in 0..8 {
            metrics.record_hit();
        }
        metrics.record_miss();
        metrics.record_miss();

        assert_eq!(metrics.hits(), 8);
        assert_eq!(metrics.misses(), 2);
        assert!((metrics.hit_rate() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_prometheus_rendering() {
        let snapshot = MetricsSnapshot {
            keys_total: 3,
            memory_bytes: 4096,
            hits_total: 10,
            misses_total: 2,
            hit_rate: 10.0 / 12.0,
            evictions_total: 1,
            expired_keys_total: 4,
            uptime_seconds: 60,
            instances_total: 2,
            nodes_total: 1,
            tee_instances: 1,
        };

        let text = render_prometheus(&snapshot);
        assert!(text.contains("# TYPE cache_keys_total gauge"));
        assert!(text.contains("cache_keys_total 3"));
        assert!(text.contains("cache_memory_bytes 4096"));
        assert!(text.contains("cache_hits_total 10"));
        assert!(text.contains("cache_hit_rate 0.8333"));
        assert!(text.contains("cache_tee_instances 1"));
    }
}
