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
pub struct MembersRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    pub added: u64,
}

/// POST /cache/sadd
pub async fn sadd(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MembersRequest>,
) -> CacheResult<Json<AddedResponse>> {
    require_key(&req.key)?;
    if req.members.is_empty() {
        return Err(CacheError::invalid("at least one member is required"));
    }
    let resolved = state.router.resolve(&req.namespace).await?;
    let added = resolved.engine.sadd(&req.namespace, &req.key, req.members)?;
    Ok(Json(AddedResponse { added }))
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

/// POST /cache/srem
pub async fn srem(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MembersRequest>,
) -> CacheResult<Json<RemovedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let removed = resolved.engine.srem(&req.namespace, &req.key, &req.members)?;
    Ok(Json(RemovedResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct SetQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<String>,
}

/// GET /cache/smembers
pub async fn smembers(
    State(state): State<AppState>,
    Query(query): Query<SetQuery>,
) -> CacheResult<Json<MembersResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let members = resolved.engine.smembers(&query.namespace, &query.key)?;
    Ok(Json(MembersResponse { members }))
}

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub member: String,
}

#[derive(Debug, Serialize)]
pub struct IsMemberResponse {
    #[serde(rename = "isMember")]
    pub is_member: bool,
}

/// GET /cache/sismember
pub async fn sismember(
    State(state): State<AppState>,
    Query(query): Query<MemberQuery>,
) -> CacheResult<Json<IsMemberResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let is_member = resolved
        .engine
        .sismember(&query.namespace, &query.key, &query.member)?;
    Ok(Json(IsMemberResponse { is_member }))
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub count: u64,
}

/// GET /cache/scard
pub async fn scard(
    State(state): State<AppState>,
    Query(query): Query<SetQuery>,
) -> CacheResult<Json<CardResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let count = resolved.engine.scard(&query.namespace, &query.key)?;
    Ok(Json(CardResponse { count }))
}

#[derive(Debug, Deserialize)]
pub struct PopRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub member: Option<String>,
}

/// POST /cache/spop
pub async fn spop(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PopRequest>,
) -> CacheResult<Json<MemberResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let member = resolved.engine.spop(&req.namespace, &req.key)?;
    Ok(Json(MemberResponse { member }))
}

/// GET /cache/srandmember
pub async fn srandmember(
    State(state): State<AppState>,
    Query(query): Query<SetQuery>,
) -> CacheResult<Json<MemberResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let member = resolved.engine.srandmember(&query.namespace, &query.key)?;
    Ok(Json(MemberResponse { member }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/sadd", post(sadd))
        .route("/cache/srem", post(srem))
        .route("/cache/smembers", get(smembers))
        .route("/cache/sismember", get(sismember))
        .route("/cache/scard", get(scard))
        .route("/cache/spop", post(spop))
        .route("/cache/srandmember", get(srandmember))
}
