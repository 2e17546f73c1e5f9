pub mod hashes;
pub mod instances;
pub mod introspection;
pub mod keyspace;
pub mod lists;
pub mod pubsub;
pub mod registry;
pub mod sets;
pub mod streams;
pub mod strings;
pub mod ttl;
pub mod zsets;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::{async_trait, middleware, Json, Router};

use crate::errors::CacheError;
use crate::rate_limit::rate_limit_middleware;
use crate::state::AppState;

/// `Json` extractor that reports malformed bodies as `InvalidOperation`
/// instead of axum's default rejection.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = CacheError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(CacheError::invalid(rejection.body_text())),
        }
    }
}

pub(crate) fn default_namespace() -> String {
    "default".to_string()
}

/// Rejects empty keys before they reach the engine.
pub(crate) fn require_key(key: &str) -> Result<(), crate::errors::CacheError> {
    if key.trim().is_empty() {
        return Err(crate::errors::CacheError::invalid("key must not be empty"));
    }
    Ok(())
}

/// Full service router with the rate-limit middleware applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(strings::routes())
        .merge(ttl::routes())
        .merge(hashes::routes())
        .merge(lists::routes())
        .merge(sets::routes())
        .merge(zsets::routes())
        .merge(streams::routes())
        .merge(keyspace::routes())
        .merge(pubsub::routes())
        .merge(instances::routes())
        .merge(registry::routes())
        .merge(introspection::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .with_state(state)
}
