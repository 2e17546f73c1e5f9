use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cachegrid_backend::api;
use cachegrid_backend::config::CacheConfig;
use cachegrid_backend::engine::reaper::TtlReaper;
use cachegrid_backend::env_config;
use cachegrid_backend::events::EventBus;
use cachegrid_backend::metrics::CacheMetrics;
use cachegrid_backend::provisioning::{AllowAllBilling, ProvisioningManager};
use cachegrid_backend::pubsub::PubSubBroker;
use cachegrid_backend::rate_limit::{self, RateLimiter};
use cachegrid_backend::registry::{PodIdentity, SqliteWorkerStore, WorkerRegistry, WorkerStore};
use cachegrid_backend::routing::InstanceRouter;
use cachegrid_backend::state::AppState;
use cachegrid_backend::tee;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cachegrid_backend=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    env_config::validate_env()?;
    env_config::log_env_config();

    let config = CacheConfig::from_env();
    tracing::info!(
        "Starting cache engine (max_memory_mb: {}, default_ttl: {}s, policy: {})",
        config.max_memory_mb,
        config.default_ttl_seconds,
        config.eviction_policy
    );

    // Core services, constructed once and shared through AppState.
    let events = Arc::new(EventBus::new());
    let metrics = Arc::new(CacheMetrics::new());
    let provisioning = Arc::new(ProvisioningManager::new(
        Arc::new(AllowAllBilling),
        Arc::clone(&events),
    ));

    let tee_provider = tee::provider_from_config(&config)
        .map_err(|e| anyhow::anyhow!("tee configuration: {e}"))?;
    if let Some(provider) = &tee_provider {
        tracing::info!("TEE provider configured: {}", provider.name());
    }

    let router = Arc::new(InstanceRouter::new(
        config.clone(),
        Arc::clone(&provisioning),
        tee_provider.clone(),
        Arc::clone(&metrics),
        Arc::clone(&events),
    ));

    // Worker registry, optionally backed by a persistent store.
    let store: Option<Arc<dyn WorkerStore>> = match &config.worker_store_url {
        Some(url) => {
            tracing::info!("Connecting worker store...");
            Some(Arc::new(SqliteWorkerStore::connect(url).await?))
        }
        None => None,
    };
    let registry = Arc::new(WorkerRegistry::new(
        PodIdentity {
            pod_id: config.pod_id.clone(),
            region: config.pod_region.clone(),
            endpoint: config.pod_endpoint.clone(),
        },
        router.shared(),
        store,
        Arc::clone(&events),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        router: Arc::clone(&router),
        broker: Arc::new(PubSubBroker::new()),
        rate_limiter: Arc::new(RateLimiter::new()),
        provisioning,
        registry: Arc::clone(&registry),
        metrics,
        events: Arc::clone(&events),
        started_at: chrono::Utc::now(),
    };

    // Background loops.
    tokio::spawn(TtlReaper::new(Arc::clone(&router)).run());
    tokio::spawn(rate_limit::janitor_loop(state.clone()));
    tokio::spawn(Arc::clone(&registry).run_heartbeat());
    tokio::spawn(Arc::clone(&registry).run_resync());
    if let Some(provider) = tee_provider {
        tokio::spawn(tee::attestation_loop(provider, events));
    }

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    registry.close();
    Ok(())
}
