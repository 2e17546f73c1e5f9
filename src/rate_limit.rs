use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::errors::CacheError;
use crate::state::AppState;

/// Fixed window length and per-caller ceiling. Both are currently fixed.
pub const WINDOW_SECONDS: i64 = 60;
pub const REQUEST_LIMIT: u32 = 1000;

/// Paths that are never counted against a caller.
const EXEMPT_PATHS: &[&str] = &["/cache/health", "/cache/metrics"];

#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    reset_at: i64,
}

/// Fixed-window counter per caller key (owner address preferred, else
/// client IP).
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, WindowRecord>,
}

/// Rate limit information attached to responses.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    pub reset_after: i64,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request against the key. The increment happens before the
    /// comparison, so the stored count can reach limit + 1 but never beyond.
    pub fn check(&self, key: &str) -> Result<RateLimitInfo, CacheError> {
        let now = chrono::Utc::now().timestamp();
        let mut record = self
            .windows
            .entry(key.to_string())
            .or_insert(WindowRecord {
                count: 0,
                reset_at: now + WINDOW_SECONDS,
            });

        if record.reset_at <= now {
            record.count = 0;
            record.reset_at = now + WINDOW_SECONDS;
        }

        record.count += 1;
        let reset_after = (record.reset_at - now).max(1);
        if record.count > REQUEST_LIMIT {
            record.count = REQUEST_LIMIT + 1;
            return Err(CacheError::RateLimited {
                retry_after: reset_after,
            });
        }

        Ok(RateLimitInfo {
            limit: REQUEST_LIMIT,
            remaining: REQUEST_LIMIT - record.count,
            reset_after,
        })
    }

    /// Janitor pass: wipes records whose window has ended.
    pub fn sweep(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let before = self.windows.len();
        self.windows.retain(|_, record| record.reset_at > now);
        before - self.windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Caller key precedence: owner address, then forwarded/real IP headers,
/// then the socket address, then "unknown".
pub fn caller_key(headers: &HeaderMap, peer: Option<&std::net::SocketAddr>) -> String {
    if let Some(owner) = headers
        .get("x-owner-address")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return owner.to_ascii_lowercase();
    }
    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(ip) = headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return ip.to_string();
        }
    }
    peer.map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
}

/// Middleware applying the fixed window and attaching `X-RateLimit-*`
/// headers to every non-exempt response.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<std::net::SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if EXEMPT_PATHS.contains(&path.as_str()) {
        return next.run(req).await;
    }

    let key = caller_key(req.headers(), peer.as_ref().map(|c| &c.0));
    let (info, mut response) = match state.rate_limiter.check(&key) {
        Ok(info) => (info, next.run(req).await),
        Err(err) => {
            let retry_after = match err {
                CacheError::RateLimited { retry_after } => retry_after,
                _ => WINDOW_SECONDS,
            };
            let info = RateLimitInfo {
                limit: REQUEST_LIMIT,
                remaining: 0,
                reset_after: retry_after,
            };
            (info, err.into_response())
        }
    };

    let headers = response.headers_mut();
    if let Ok(value) = info.limit.to_string().parse() {
        headers.insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = info.remaining.to_string().parse() {
        headers.insert("X-RateLimit-Remaining", value);
    }
    if let Ok(value) = info.reset_after.to_string().parse() {
        headers.insert("X-RateLimit-Reset", value);
    }
    response
}

/// Janitor loop wiping expired windows.
pub async fn janitor_loop(state: AppState) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
        WINDOW_SECONDS as u64,
    ));
    loop {
        ticker.tick().await;
        let wiped = state.rate_limiter.sweep();
        if wiped > 0 {
            tracing::debug!("rate-limit janitor wiped {} expired windows", wiped);
        }
    }
}
