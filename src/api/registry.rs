use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::errors::{CacheError, CacheResult};
use crate::registry::{PodHeartbeat, WarmPod, WorkerLookup};
use crate::state::AppState;

/// GET /cache/registry/workers/:id — multi-tier lookup result including the
/// answering tier.
pub async fn get_worker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> CacheResult<Json<WorkerLookup>> {
    state
        .registry
        .get_worker(&id)
        .await?
        .map(Json)
        .ok_or_else(|| CacheError::NotFound(format!("worker {id} not found")))
}

#[derive(Debug, Deserialize)]
pub struct WarmPodsQuery {
    pub region: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WarmPodsResponse {
    pub pods: Vec<WarmPod>,
}

/// GET /cache/registry/workers/:id/pods
pub async fn warm_pods(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WarmPodsQuery>,
) -> CacheResult<Json<WarmPodsResponse>> {
    let pods = state
        .registry
        .find_warm_pods(&id, query.region.as_deref())
        .await?;
    Ok(Json(WarmPodsResponse { pods }))
}

#[derive(Debug, Serialize)]
pub struct PodsResponse {
    pub pods: Vec<PodHeartbeat>,
    pub total: usize,
}

/// GET /cache/registry/pods — pods with a live heartbeat.
pub async fn live_pods(State(state): State<AppState>) -> CacheResult<Json<PodsResponse>> {
    let pods = state.registry.live_pods()?;
    let total = pods.len();
    Ok(Json(PodsResponse { pods, total }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/registry/workers/:id", get(get_worker))
        .route("/cache/registry/workers/:id/pods", get(warm_pods))
        .route("/cache/registry/pods", get(live_pods))
}
