use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub type CacheResult<T> = Result<T, CacheError>;

/// Error taxonomy for the whole service. Every public entry point returns
/// `Result`; handlers convert the variant into the JSON error envelope.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("{0}")]
    InvalidOperation(String),

    #[error("ttl {requested}s exceeds the maximum of {max}s")]
    TtlExceeded { requested: u64, max: u64 },

    #[error("memory limit exhausted: {0}")]
    MemoryLimit(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("payment required: {0}")]
    PaymentRequired(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after: i64 },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Gone(String),

    #[error("node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("attestation failed: {0}")]
    AttestationFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CacheError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Stable machine-readable code carried in every error payload.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOperation(_) => "INVALID_OPERATION",
            Self::TtlExceeded { .. } => "TTL_EXCEEDED",
            Self::MemoryLimit(_) => "MEMORY_LIMIT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::PaymentRequired(_) => "PAYMENT_REQUIRED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Gone(_) => "GONE",
            Self::NodeUnavailable(_) => "NODE_UNAVAILABLE",
            Self::AttestationFailed(_) => "ATTESTATION_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidOperation(_) | Self::TtlExceeded { .. } | Self::MemoryLimit(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Gone(_) => StatusCode::GONE,
            Self::NodeUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::AttestationFailed(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("codec failure: {err}"))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    retry_after: Option<i64>,
}

impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let retry_after = match self {
            Self::RateLimited { retry_after } => Some(retry_after),
            _ => None,
        };
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            code: self.code(),
            retry_after,
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::PAYMENT_REQUIRED {
            response
                .headers_mut()
                .insert("X-Payment-Required", HeaderValue::from_static("true"));
        }
        response
    }
}
