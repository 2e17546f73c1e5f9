use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::errors::{CacheError, CacheResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct LengthResponse {
    pub length: u64,
}

/// POST /cache/lpush
pub async fn lpush(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PushRequest>,
) -> CacheResult<Json<LengthResponse>> {
    require_key(&req.key)?;
    if req.values.is_empty() {
        return Err(CacheError::invalid("at least one value is required"));
    }
    let resolved = state.router.resolve(&req.namespace).await?;
    let length = resolved.engine.lpush(&req.namespace, &req.key, req.values)?;
    Ok(Json(LengthResponse { length }))
}

/// POST /cache/rpush
pub async fn rpush(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PushRequest>,
) -> CacheResult<Json<LengthResponse>> {
    require_key(&req.key)?;
    if req.values.is_empty() {
        return Err(CacheError::invalid("at least one value is required"));
    }
    let resolved = state.router.resolve(&req.namespace).await?;
    let length = resolved.engine.rpush(&req.namespace, &req.key, req.values)?;
    Ok(Json(LengthResponse { length }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct PopResponse {
    pub value: Option<String>,
}

/// GET /cache/lpop
pub async fn lpop(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> CacheResult<Json<PopResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let value = resolved.engine.lpop(&query.namespace, &query.key)?;
    Ok(Json(PopResponse { value }))
}

/// GET /cache/rpop
pub async fn rpop(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> CacheResult<Json<PopResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let value = resolved.engine.rpop(&query.namespace, &query.key)?;
    Ok(Json(PopResponse { value }))
}

#[derive(Debug, Deserialize)]
pub struct RangeRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub start: i64,
    pub stop: i64,
}

#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub values: Vec<String>,
}

/// POST /cache/lrange
pub async fn lrange(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RangeRequest>,
) -> CacheResult<Json<RangeResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let values = resolved
        .engine
        .lrange(&req.namespace, &req.key, req.start, req.stop)?;
    Ok(Json(RangeResponse { values }))
}

/// GET /cache/llen
pub async fn llen(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> CacheResult<Json<LengthResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let length = resolved.engine.llen(&query.namespace, &query.key)?;
    Ok(Json(LengthResponse { length }))
}

#[derive(Debug, Serialize)]
pub struct TrimResponse {
    pub trimmed: bool,
}

/// POST /cache/ltrim
pub async fn ltrim(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RangeRequest>,
) -> CacheResult<Json<TrimResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    resolved
        .engine
        .ltrim(&req.namespace, &req.key, req.start, req.stop)?;
    Ok(Json(TrimResponse { trimmed: true }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/lpush", post(lpush))
        .route("/cache/rpush", post(rpush))
        .route("/cache/lpop", get(lpop))
        .route("/cache/rpop", get(rpop))
        .route("/cache/lrange", post(lrange))
        .route("/cache/llen", get(llen))
        .route("/cache/ltrim", post(ltrim))
}
