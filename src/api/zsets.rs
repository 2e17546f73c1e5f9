use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::{default_namespace, require_key, ApiJson};
use crate::engine::ZsetMember;
use crate::errors::{CacheError, CacheResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ZAddMember {
    pub member: String,
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct ZAddRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub members: Vec<ZAddMember>,
}

#[derive(Debug, Serialize)]
pub struct AddedResponse {
    pub added: u64,
}

/// POST /cache/zadd
pub async fn zadd(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ZAddRequest>,
) -> CacheResult<Json<AddedResponse>> {
    require_key(&req.key)?;
    if req.members.is_empty() {
        return Err(CacheError::invalid("at least one member is required"));
    }
    let members = req
        .members
        .into_iter()
        .map(|m| ZsetMember {
            member: m.member,
            score: m.score,
        })
        .collect();
    let resolved = state.router.resolve(&req.namespace).await?;
    let added = resolved.engine.zadd(&req.namespace, &req.key, members)?;
    Ok(Json(AddedResponse { added }))
}

#[derive(Debug, Deserialize)]
pub struct ZRangeQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub start: i64,
    pub stop: i64,
    #[serde(default, rename = "withScores")]
    pub with_scores: bool,
}

#[derive(Debug, Serialize)]
pub struct ZRangeResponse {
    pub members: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<f64>>,
}

fn range_response(members: Vec<ZsetMember>, with_scores: bool) -> ZRangeResponse {
    let scores = with_scores.then(|| members.iter().map(|m| m.score).collect());
    ZRangeResponse {
        members: members.into_iter().map(|m| m.member).collect(),
        scores,
    }
}

/// GET /cache/zrange
pub async fn zrange(
    State(state): State<AppState>,
    Query(query): Query<ZRangeQuery>,
) -> CacheResult<Json<ZRangeResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let members = resolved
        .engine
        .zrange(&query.namespace, &query.key, query.start, query.stop)?;
    Ok(Json(range_response(members, query.with_scores)))
}

#[derive(Debug, Deserialize)]
pub struct ZRangeByScoreRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub min: f64,
    pub max: f64,
    #[serde(default, rename = "withScores")]
    pub with_scores: bool,
}

/// POST /cache/zrangebyscore
pub async fn zrangebyscore(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ZRangeByScoreRequest>,
) -> CacheResult<Json<ZRangeResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let members = resolved
        .engine
        .zrange_by_score(&req.namespace, &req.key, req.min, req.max)?;
    Ok(Json(range_response(members, req.with_scores)))
}

#[derive(Debug, Deserialize)]
pub struct ZRemRequest {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: u64,
}

/// POST /cache/zrem
pub async fn zrem(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ZRemRequest>,
) -> CacheResult<Json<RemovedResponse>> {
    require_key(&req.key)?;
    let resolved = state.router.resolve(&req.namespace).await?;
    let removed = resolved.engine.zrem(&req.namespace, &req.key, &req.members)?;
    Ok(Json(RemovedResponse { removed }))
}

#[derive(Debug, Deserialize)]
pub struct ZScoreQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
    pub member: String,
}

#[derive(Debug, Serialize)]
pub struct ZScoreResponse {
    pub member: String,
    pub score: Option<f64>,
}

/// GET /cache/zscore
pub async fn zscore(
    State(state): State<AppState>,
    Query(query): Query<ZScoreQuery>,
) -> CacheResult<Json<ZScoreResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let score = resolved
        .engine
        .zscore(&query.namespace, &query.key, &query.member)?;
    Ok(Json(ZScoreResponse {
        member: query.member,
        score,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ZCardQuery {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct CardResponse {
    pub count: u64,
}

/// GET /cache/zcard
pub async fn zcard(
    State(state): State<AppState>,
    Query(query): Query<ZCardQuery>,
) -> CacheResult<Json<CardResponse>> {
    require_key(&query.key)?;
    let resolved = state.router.resolve(&query.namespace).await?;
    let count = resolved.engine.zcard(&query.namespace, &query.key)?;
    Ok(Json(CardResponse { count }))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/zadd", post(zadd))
        .route("/cache/zrange", get(zrange))
        .route("/cache/zrangebyscore", post(zrangebyscore))
        .route("/cache/zrem", post(zrem))
        .route("/cache/zscore", get(zscore))
        .route("/cache/zcard", get(zcard))
}
