use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::engine::NamespaceStats;
use crate::metrics::render_prometheus;
use crate::state::AppState;

/// GET /cache/health
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "cachegrid-backend",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.uptime_seconds(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub keys_total: u64,
    pub memory_bytes: u64,
    pub max_memory_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expired_keys: u64,
    pub namespaces: Vec<NamespaceStats>,
    pub instances: u64,
    pub tee_instances: u64,
    pub nodes: u64,
    pub uptime_seconds: u64,
}

/// GET /cache/stats
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state.metrics_snapshot();
    let mut namespaces = Vec::new();
    for engine in state.router.engines() {
        namespaces.extend(engine.stats().namespaces);
    }
    namespaces.sort_by(|a, b| a.namespace.cmp(&b.namespace));

    Json(StatsResponse {
        keys_total: snapshot.keys_total,
        memory_bytes: snapshot.memory_bytes,
        max_memory_bytes: state.config.max_memory_bytes(),
        hits: snapshot.hits_total,
        misses: snapshot.misses_total,
        hit_rate: snapshot.hit_rate,
        evictions: snapshot.evictions_total,
        expired_keys: snapshot.expired_keys_total,
        namespaces,
        instances: snapshot.instances_total,
        tee_instances: snapshot.tee_instances,
        nodes: snapshot.nodes_total,
        uptime_seconds: snapshot.uptime_seconds,
    })
}

/// GET /cache/metrics — Prometheus text format.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = render_prometheus(&state.metrics_snapshot());
    let mut response = body.into_response();
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/health", get(health))
        .route("/cache/stats", get(stats))
        .route("/cache/metrics", get(metrics))
}
