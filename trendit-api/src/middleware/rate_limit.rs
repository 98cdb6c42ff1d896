//! Per-user rate limiting for authenticated routes
//!
//! Every authenticated user owns a Redis token bucket at `ratelimit:user:{user_id}`
//! holding `RATE_LIMIT_PER_MINUTE` tokens and refilling at that rate spread over the
//! minute. Each request takes one token; an empty bucket answers 429.
//!
//! # Headers
//!
//! - `X-RateLimit-Limit`: bucket size (requests per minute)
//! - `X-RateLimit-Remaining`: tokens left after this request
//! - `Retry-After`: seconds to wait (429 responses only)
//!
//! Without Redis, or when Redis errors, requests pass through unthrottled.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use trendit_shared::auth::middleware::AuthContext;
use uuid::Uuid;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Token bucket parameters for one user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        Self {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }
}

fn bucket_key(user_id: Uuid) -> String {
    format!("ratelimit:user:{}", user_id)
}

/// Rate limiting middleware layer
///
/// Must run after authentication so the [`AuthContext`] is available.
///
/// # Errors
///
/// - 429 Too Many Requests: rate limit exceeded
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(redis) = state.redis.as_ref() else {
        return Ok(next.run(request).await);
    };

    let limit = RateLimit::per_minute(state.config.rate_limit.per_minute);

    let bucket = match redis
        .take_token(&bucket_key(auth.user_id), limit.requests_per_minute, limit.refill_rate)
        .await
    {
        Ok(bucket) => bucket,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id, "Rate limit check failed, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !bucket.allowed {
        tracing::debug!(user_id = %auth.user_id, retry_after = bucket.retry_after, "Rate limit exceeded");

        let mut response = ApiError::RateLimitExceeded {
            retry_after: bucket.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                bucket.retry_after
            ),
        }
        .into_response();
        set_headers(&mut response, limit.requests_per_minute, 0);
        return Ok(response);
    }

    let mut response = next.run(request).await;
    set_headers(&mut response, limit.requests_per_minute, bucket.remaining);

    Ok(response)
}

fn set_headers(response: &mut Response, limit: u32, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(120);
        assert_eq!(limit.requests_per_minute, 120);
        assert_eq!(limit.refill_rate, 2.0);

        let limit = RateLimit::per_minute(10);
        assert!((limit.refill_rate - 0.1667).abs() < 0.001);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(RateLimit::per_minute(0).requests_per_minute, 1);
    }

    #[test]
    fn test_bucket_key() {
        let id = Uuid::nil();
        assert_eq!(bucket_key(id), "ratelimit:user:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn test_headers_are_set() {
        let mut response = Response::new(axum::body::Body::empty());
        set_headers(&mut response, 60, 59);

        assert_eq!(response.headers().get(LIMIT_HEADER).unwrap(), "60");
        assert_eq!(response.headers().get(REMAINING_HEADER).unwrap(), "59");
    }
}
