//! Admission control for trade session upgrades.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde_json::json;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::config::PankowConfig;

pub struct RateLimiterConfig {
    /// Session upgrades admitted per minute, across all clients
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::from(&PankowConfig::default())
    }
}

impl From<&PankowConfig> for RateLimiterConfig {
    fn from(config: &PankowConfig) -> Self {
        Self {
            requests_per_minute: config.requests_per_minute,
        }
    }
}

pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// A zero rate is raised to one per minute.
pub fn create_rate_limiter(config: RateLimiterConfig) -> GlobalRateLimiter {
    let per_minute = NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)))
}

/// Reject the request with 429 once the shared quota is spent.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    if limiter.check().is_ok() {
        return next.run(request).await;
    }

    tracing::warn!(
        "Rejected {} {}: session rate limit reached",
        request.method(),
        request.uri().path()
    );
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({"error": "Too many trade sessions, retry later"})),
    )
        .into_response()
}
