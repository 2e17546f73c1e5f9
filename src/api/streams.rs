use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::engine::StreamEntry;
use crate::errors::CacheResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct XAddRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct XAddResponse {
    pub id: String,
}

/// POST /cache/xadd
pub async fn xadd(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<XAddRequest>,
) -> CacheResult<Json<XAddResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let id = resolved.engine.xadd(&req.namespace, &req.key, req.fields)?;
    Ok(Json(XAddResponse { id }))
}

#[derive(Debug, Deserialize)]
pub struct XRangeRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    #[serde(default = "open_start")]
    pub start: String,
    #[serde(default = "open_end")]
    pub end: String,
    pub count: Option<usize>,
}

fn open_start() -> String {
    "-".to_string()
}

fn open_end() -> String {
    "+".to_string()
}

#[derive(Debug, Serialize)]
pub struct XRangeResponse {
    pub entries: Vec<StreamEntry>,
}

/// POST /cache/xrange
pub async fn xrange(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<XRangeRequest>,
) -> CacheResult<Json<XRangeResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let entries = resolved.engine.xrange(
        &req.namespace,
        &req.key,
        &req.start,
        &req.end,
        req.count,
    )?;
    Ok(Json(XRangeResponse { entries }))
}

#[derive(Debug, Deserialize)]
pub struct XLenQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct LengthResponse {
    pub length: u64,
}

/// GET /cache/xlen
pub async fn xlen(
    State(state): State<AppState>,
    Query(query): Query<XLenQuery>,
) -> CacheResult<Json<LengthResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let length = resolved.engine.xlen(&query.namespace, &query.key)?;
    Ok(Json(LengthResponse { length }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/xadd", post(xadd))
        .route("/cache/xrange", post(xrange))
        .route("/cache/xlen", get(xlen))
}
