use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::ApiJson;
use crate::auth::required_owner;
use crate::errors::{CacheError, CacheResult};
use crate::provisioning::{plan_catalog, InstanceRecord, PlanSpec};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: &'static [PlanSpec],
}

/// GET /cache/plans
pub async fn list_plans() -> Json<PlansResponse> {
    Json(PlansResponse {
        plans: plan_catalog(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateInstanceRequest {
    pub plan: String,
    pub namespace: Option<String>,
    pub label: Option<String>,
}

/// POST /cache/instances
pub async fn create_instance(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateInstanceRequest>,
) -> CacheResult<(StatusCode, Json<InstanceRecord>)> {
    let owner = required_owner(&headers)?;
    let record =
        state
            .provisioning
            .create_instance(owner, &req.plan, req.namespace, req.label)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Serialize)]
pub struct InstanceListResponse {
    pub instances: Vec<InstanceRecord>,
    pub total: usize,
}

/// GET /cache/instances — instances owned by the caller.
pub async fn list_instances(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> CacheResult<Json<InstanceListResponse>> {
    let owner = required_owner(&headers)?;
    let instances = state.provisioning.list_instances(&owner);
    let total = instances.len();
    Ok(Json(InstanceListResponse { instances, total }))
}

/// GET /cache/instances/:id
pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> CacheResult<Json<InstanceRecord>> {
    let record = state
        .provisioning
        .get_instance(id)
        .ok_or_else(|| CacheError::NotFound(format!("instance {id} not found")))?;
    Ok(Json(record))
}

/// DELETE /cache/instances/:id — verifies the owner header, flushes the
/// namespace, and drops the instance's engine.
pub async fn delete_instance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> CacheResult<Json<InstanceRecord>> {
    let owner = required_owner(&headers)?;
    let record = state.provisioning.delete_instance(id, &owner)?;
    state.router.drop_namespace(&record.namespace);
    Ok(Json(record))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cache/plans", get(list_plans))
        .route(
            "/cache/instances",
            get(list_instances).post(create_instance),
        )
        .route(
            "/cache/instances/:id",
            get(get_instance).delete(delete_instance),
        )
}
