use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::errors::CacheResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TtlQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct TtlResponse {
    pub key: String,
    /// -2 when absent, -1 when no expiry, else remaining seconds.
    pub ttl: i64,
}

/// GET /cache/ttl
pub async fn get_ttl(
    State(state): State<AppState>,
    Query(query): Query<TtlQuery>,
) -> CacheResult<Json<TtlResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let ttl = resolved.engine.ttl(&query.namespace, &query.key);
    Ok(Json(TtlResponse {
        key: query.key,
        ttl,
    }))
}

#[derive(Debug, Serialize)]
pub struct PttlResponse {
    pub key: String,
    pub pttl: i64,
}

/// GET /cache/pttl
pub async fn get_pttl(
    State(state): State<AppState>,
    Query(query): Query<TtlQuery>,
) -> CacheResult<Json<PttlResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let pttl = resolved.engine.pttl(&query.namespace, &query.key);
    Ok(Json(PttlResponse {
        key: query.key,
        pttl,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExpireRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub updated: bool,
}

/// POST /cache/expire
pub async fn expire_key(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ExpireRequest>,
) -> CacheResult<Json<UpdatedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let updated = resolved
        .engine
        .expire(&req.namespace, &req.key, req.seconds)?;
    Ok(Json(UpdatedResponse { updated }))
}

#[derive(Debug, Deserialize)]
pub struct PersistRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

/// POST /cache/persist
pub async fn persist_key(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PersistRequest>,
) -> CacheResult<Json<UpdatedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let updated = resolved.engine.persist(&req.namespace, &req.key)?;
    Ok(Json(UpdatedResponse { updated }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/ttl", get(get_ttl))
        .route("/cache/pttl", get(get_pttl))
        .route("/cache/expire", post(expire_key))
        .route("/cache/persist", post(persist_key))
}
