use serde::Serialize;

const DEFAULT_MAX_MEMORY_MB: u64 = 256;
const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_MAX_TTL_SECONDS: u64 = 30 * 24 * 3600;

/// Service configuration, loaded once at startup from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct CacheConfig {
    pub max_memory_mb: u64,
    pub default_ttl_seconds: u64,
    pub max_ttl_seconds: u64,
    pub eviction_policy: String,
    pub host: String,
    pub port: u16,
    /// Optional TEE provider: "sealed" for the local simulator, anything else
    /// requires `tee_endpoint`.
    pub tee_provider: Option<String>,
    pub tee_endpoint: Option<String>,
    pub tee_secret: Option<String>,
    /// Sqlite URL backing the worker-definition store; absent disables tier 3.
    pub worker_store_url: Option<String>,
    pub pod_id: String,
    pub pod_region: String,
    pub pod_endpoint: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            default_ttl_seconds: DEFAULT_TTL_SECONDS,
            max_ttl_seconds: DEFAULT_MAX_TTL_SECONDS,
            eviction_policy: "lru".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            tee_provider: None,
            tee_endpoint: None,
            tee_secret: None,
            worker_store_url: None,
            pod_id: format!("pod-{}", uuid::Uuid::new_v4()),
            pod_region: "local".to_string(),
            pod_endpoint: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_memory_mb: env_parse("CACHE_MAX_MEMORY_MB", defaults.max_memory_mb),
            default_ttl_seconds: env_parse("CACHE_DEFAULT_TTL_SECONDS", defaults.default_ttl_seconds),
            max_ttl_seconds: env_parse("CACHE_MAX_TTL_SECONDS", defaults.max_ttl_seconds),
            eviction_policy: std::env::var("CACHE_EVICTION_POLICY")
                .unwrap_or_else(|_| defaults.eviction_policy.clone()),
            host: std::env::var("SERVER_HOST").unwrap_or(defaults.host),
            port: env_parse("SERVER_PORT", defaults.port),
            tee_provider: std::env::var("TEE_PROVIDER").ok(),
            tee_endpoint: std::env::var("TEE_ENDPOINT").ok(),
            tee_secret: std::env::var("TEE_SECRET").ok(),
            worker_store_url: std::env::var("WORKER_STORE_URL").ok(),
            pod_id: std::env::var("POD_ID").unwrap_or(defaults.pod_id),
            pod_region: std::env::var("POD_REGION").unwrap_or(defaults.pod_region),
            pod_endpoint: std::env::var("POD_ENDPOINT").unwrap_or(defaults.pod_endpoint),
        }
    }

    /// Hard memory ceiling in bytes for one engine.
    pub fn max_memory_bytes(&self) -> u64 {
        self.max_memory_mb * 1024 * 1024
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = CacheConfig::default();

        assert_eq!(config.max_memory_mb, 256);
        assert_eq!(config.default_ttl_seconds, 3600);
        assert_eq!(config.max_ttl_seconds, 2_592_000);
        assert_eq!(config.eviction_policy, "lru");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_max_memory_bytes() {
        let config = CacheConfig {
            max_memory_mb: 1,
            ..CacheConfig::default()
        };
        assert_eq!(config.max_memory_bytes(), 1024 * 1024);
    }
}
