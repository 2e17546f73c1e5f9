use axum::{
    extract::{Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::errors::CacheResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct KeysQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

fn default_pattern() -> String {
    "*".to_string()
}

#[derive(Debug, Serialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

/// GET /cache/keys
pub async fn list_keys(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> CacheResult<Json<KeysResponse>> {
    let resolved = state.router.resolve(&query.namespace).await?;
    let keys = resolved.engine.keys(&query.namespace, &query.pattern);
    Ok(Json(KeysResponse { keys }))
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_cursor")]
    pub cursor: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

fn default_cursor() -> String {
    "0".to_string()
}

fn default_count() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub cursor: String,
    pub keys: Vec<String>,
}

/// GET /cache/scan
pub async fn scan_keys(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> CacheResult<Json<ScanResponse>> {
    let resolved = state.router.resolve(&query.namespace).await?;
    let page = resolved.engine.scan(
        &query.namespace,
        &query.cursor,
        &query.pattern,
        query.count,
    )?;
    Ok(Json(ScanResponse {
        cursor: page.cursor,
        keys: page.keys,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TypeQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct TypeResponse {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// GET /cache/type
pub async fn key_type(
    State(state): State<AppState>,
    Query(query): Query<TypeQuery>,
) -> CacheResult<Json<TypeResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let kind = resolved.engine.key_type(&query.namespace, &query.key);
    Ok(Json(TypeResponse {
        key: query.key,
        kind,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub renamed: bool,
}

/// POST /cache/rename
pub async fn rename_key(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RenameRequest>,
) -> CacheResult<Json<RenameResponse>> {
    require_key(&req.from)?;
    require_key(&req.to)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let renamed = resolved.engine.rename(&req.namespace, &req.from, &req.to)?;
    Ok(Json(RenameResponse { renamed }))
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub namespace: Option<String>,
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub flushed: bool,
}

/// DELETE /cache/clear — drops a namespace, or everything with `all=true`.
pub async fn clear(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> CacheResult<Json<ClearResponse>> {
    if query.all && query.namespace.is_none() {
        for engine in state.router.engines() {
            engine.flush_all();
        }
        return Ok(Json(ClearResponse { flushed: true }));
    }

    let namespace = query.namespace.unwrap_or_else(default_namespace);
    let resolved = state.router.resolve(&namespace).await?;
    let flushed = resolved.engine.flush_db(&namespace);
    Ok(Json(ClearResponse { flushed }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/keys", get(list_keys))
        .route("/cache/scan", get(scan_keys))
        .route("/cache/type", get(key_type))
        .route("/cache/rename", post(rename_key))
        .route("/cache/clear", delete(clear))
}
