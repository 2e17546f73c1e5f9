use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::engine::SetOptions;
use crate::errors::{CacheError, CacheResult};
use crate::routing::ResolvedEngine;
use crate::state::AppState;
use crate::tee::TeeProvider;

/// Applies the TEE seam on the way in (before the engine call).
async fn seal(resolved: &ResolvedEngine, value: String) -> CacheResult<String> {
    match &resolved.tee {
        Some(tee) => seal_with(tee.as_ref(), value).await,
        None => Ok(value),
    }
}

async fn seal_with(tee: &dyn TeeProvider, value: String) -> CacheResult<String> {
    let sealed = tee.encrypt(value.as_bytes()).await?;
    String::from_utf8(sealed)
        .map_err(|_| CacheError::AttestationFailed("sealed value is not utf-8".into()))
}

/// Applies the TEE seam on the way out (after the engine call).
async fn unseal(resolved: &ResolvedEngine, value: Option<String>) -> CacheResult<Option<String>> {
    match (&resolved.tee, value) {
        (Some(tee), Some(raw)) => {
            let plain = tee.decrypt(raw.as_bytes()).await?;
            String::from_utf8(plain)
                .map(Some)
                .map_err(|_| CacheError::AttestationFailed("decrypted value is not utf-8".into()))
        }
        (_, value) => Ok(value),
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub nx: bool,
    #[serde(default)]
    pub xx: bool,
    pub ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SetResponse {
    pub stored: bool,
}

/// POST /cache/set
pub async fn set_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetRequest>,
) -> CacheResult<Json<SetResponse>> {
    require_key(&req.key)?;
    if req.nx && req.xx {
        return Err(CacheError::invalid("nx and xx are mutually exclusive"));
    }

    let resolved = state.router.resolve(&req.namespace).await?;
    let value = seal(&resolved, req.value).await?;
    let stored = resolved.engine.set(
        &req.namespace,
        &req.key,
        value,
        SetOptions {
            nx: req.nx,
            xx: req.xx,
            ttl: req.ttl,
        },
    )?;
    Ok(Json(SetResponse { stored }))
}

#[derive(Debug, Deserialize)]
pub struct SetNxRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub value: String,
    pub ttl: Option<u64>,
}

/// POST /cache/setnx
pub async fn set_nx(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SetNxRequest>,
) -> CacheResult<Json<SetResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let value = seal(&resolved, req.value).await?;
    let stored = resolved.engine.set(
        &req.namespace,
        &req.key,
        value,
        SetOptions {
            nx: true,
            xx: false,
            ttl: req.ttl,
        },
    )?;
    Ok(Json(SetResponse { stored }))
}

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct GetResponse {
    pub key: String,
    pub value: Option<String>,
    pub found: bool,
}

/// GET /cache/get
pub async fn get_value(
    State(state): State<AppState>,
    Query(query): Query<GetQuery>,
) -> CacheResult<Json<GetResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let raw = resolved.engine.get(&query.namespace, &query.key)?;
    let value = unseal(&resolved, raw).await?;
    Ok(Json(GetResponse {
        key: query.key,
        found: value.is_some(),
        value,
    }))
}

#[derive(Debug, Deserialize)]
pub struct KeysRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub keys: Vec<String>,
    pub key: Option<String>,
}

impl KeysRequest {
    fn all_keys(self) -> Vec<String> {
        let mut keys = self.keys;
        if let Some(key) = self.key {
            keys.push(key);
        }
        keys
    }
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

/// POST /cache/del
pub async fn del_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<KeysRequest>,
) -> CacheResult<Json<DeletedResponse>> {
    let namespace = req.namespace.clone();
    let keys = req.all_keys();
    if keys.is_empty() {
        return Err(CacheError::invalid("at least one key is required"));
    }
    let resolved = state.router.resolve(&namespace).await?;
    let deleted = resolved.engine.del(&namespace, &keys);
    Ok(Json(DeletedResponse { deleted }))
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub count: usize,
}

/// POST /cache/exists
pub async fn exists_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<KeysRequest>,
) -> CacheResult<Json<ExistsResponse>> {
    let namespace = req.namespace.clone();
    let keys = req.all_keys();
    if keys.is_empty() {
        return Err(CacheError::invalid("at least one key is required"));
    }
    let resolved = state.router.resolve(&namespace).await?;
    Ok(Json(ExistsResponse {
        count: resolved.engine.exists(&namespace, &keys),
    }))
}

#[derive(Debug, Deserialize)]
pub struct MGetRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MGetResponse {
    pub values: Vec<Option<String>>,
}

/// POST /cache/mget
pub async fn mget_values(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MGetRequest>,
) -> CacheResult<Json<MGetResponse>> {
    let resolved = state.router.resolve(&req.namespace).await?;
    let raw = resolved.engine.mget(&req.namespace, &req.keys)?;

    let mut values = Vec::with_capacity(raw.len());
    for value in raw {
        values.push(unseal(&resolved, value).await?);
    }
    Ok(Json(MGetResponse { values }))
}

#[derive(Debug, Deserialize)]
pub struct MSetEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct MSetRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub entries: Vec<MSetEntry>,
}

#[derive(Debug, Serialize)]
pub struct MSetResponse {
    pub stored: usize,
}

/// POST /cache/mset
pub async fn mset_values(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MSetRequest>,
) -> CacheResult<Json<MSetResponse>> {
    if req.entries.is_empty() {
        return Err(CacheError::invalid("at least one entry is required"));
    }
    let resolved = state.router.resolve(&req.namespace).await?;

    let mut pairs = Vec::with_capacity(req.entries.len());
    for entry in req.entries {
        require_key(&entry.key)?;
        pairs.push((entry.key, seal(&resolved, entry.value).await?));
    }
    let stored = resolved.engine.mset(&req.namespace, &pairs)?;
    Ok(Json(MSetResponse { stored }))
}

#[derive(Debug, Deserialize)]
pub struct CounterRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    #[serde(default = "default_step")]
    pub by: i64,
}

fn default_step() -> i64 {
    1
}

#[derive(Debug, Serialize)]
pub struct CounterResponse {
    pub value: i64,
}

/// POST /cache/incr
pub async fn incr_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CounterRequest>,
) -> CacheResult<Json<CounterResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let value = resolved.engine.incr_by(&req.namespace, &req.key, req.by)?;
    Ok(Json(CounterResponse { value }))
}

/// POST /cache/decr
pub async fn decr_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CounterRequest>,
) -> CacheResult<Json<CounterResponse>> {
    require_key(&req.key)?;
    let by = req
        .by
        .checked_neg()
        .ok_or_else(|| CacheError::invalid("decrement out of range"))?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let value = resolved.engine.incr_by(&req.namespace, &req.key, by)?;
    Ok(Json(CounterResponse { value }))
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct AppendResponse {
    pub length: usize,
}

/// POST /cache/append
pub async fn append_value(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AppendRequest>,
) -> CacheResult<Json<AppendResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let length = resolved
        .engine
        .append(&req.namespace, &req.key, &req.value)?;
    Ok(Json(AppendResponse { length }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/set", post(set_value))
        .route("/cache/setnx", post(set_nx))
        .route("/cache/get", get(get_value))
        .route("/cache/del", post(del_value))
        .route("/cache/exists", post(exists_value))
        .route("/cache/mget", post(mget_values))
        .route("/cache/mset", post(mset_values))
        .route("/cache/incr", post(incr_value))
        .route("/cache/decr", post(decr_value))
        .route("/cache/append", post(append_value))
}
