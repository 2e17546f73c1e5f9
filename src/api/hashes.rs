use std::collections::BTreeMap;

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
pub struct HashFieldQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub field: String,
}

#[derive(Debug, Serialize)]
pub struct HashFieldResponse {
    pub field: String,
    pub value: Option<String>,
    pub found: bool,
}

/// GET /cache/hget
pub async fn hget(
    State(state): State<AppState>,
    Query(query): Query<HashFieldQuery>,
) -> CacheResult<Json<HashFieldResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let value = resolved
        .engine
        .hget(&query.namespace, &query.key, &query.field)?;
    Ok(Json(HashFieldResponse {
        field: query.field,
        found: value.is_some(),
        value,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HSetRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    pub added: u64,
}

/// POST /cache/hset
pub async fn hset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HSetRequest>,
) -> CacheResult<Json<AddedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let added = resolved
        .engine
        .hset(&req.namespace, &req.key, req.field, req.value)?;
    Ok(Json(AddedResponse { added }))
}

#[derive(Debug, Deserialize)]
pub struct HMSetRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub fields: BTreeMap<String, String>,
}

/// POST /cache/hmset
pub async fn hmset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HMSetRequest>,
) -> CacheResult<Json<AddedResponse>> {
    require_key(&req.key)?;
    if req.fields.is_empty() {
        return Err(crate::errors::CacheError::invalid(
            "at least one field is required",
        ));
    }
    let resolved = state.router.resolve(&req.namespace).await?;
    let added = resolved.engine.hmset(&req.namespace, &req.key, req.fields)?;
    Ok(Json(AddedResponse { added }))
}

#[derive(Debug, Deserialize)]
pub struct HashQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct HGetAllResponse {
    pub fields: BTreeMap<String, String>,
    pub found: bool,
}

/// GET /cache/hgetall
pub async fn hgetall(
    State(state): State<AppState>,
    Query(query): Query<HashQuery>,
) -> CacheResult<Json<HGetAllResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let fields = resolved.engine.hgetall(&query.namespace, &query.key)?;
    Ok(Json(HGetAllResponse {
        found: fields.is_some(),
        fields: fields.unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct HDelRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

/// POST /cache/hdel
pub async fn hdel(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HDelRequest>,
) -> CacheResult<Json<RemovedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let removed = resolved.engine.hdel(&req.namespace, &req.key, &req.fields)?;
    Ok(Json(RemovedResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct HIncrByRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub field: String,
    pub by: i64,
}

#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub value: i64,
}

/// POST /cache/hincrby
pub async fn hincrby(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<HIncrByRequest>,
) -> CacheResult<Json<CounterResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let value = resolved
        .engine
        .hincr_by(&req.namespace, &req.key, req.field, req.by)?;
    Ok(Json(CounterResponse { value }))
}

#[derive(Debug, Serialize)]
pub struct LengthResponse {
    pub length: u64,
}

/// GET /cache/hlen
pub async fn hlen(
    State(state): State<AppState>,
    Query(query): Query<HashQuery>,
) -> CacheResult<Json<LengthResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let length = resolved.engine.hlen(&query.namespace, &query.key)?;
    Ok(Json(LengthResponse { length }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/hget", get(hget))
        .route("/cache/hset", post(hset))
        .route("/cache/hmset", post(hmset))
        .route("/cache/hgetall", get(hgetall))
        .route("/cache/hdel", post(hdel))
        .route("/cache/hincrby", post(hincrby))
        .route("/cache/hlen", get(hlen))
}
