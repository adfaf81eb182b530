//! # Per-Caller Rate Limiting
//!
//! Fixed-window limiter keyed by the authenticated user id. Callers without
//! a user binding share one bucket per role. Buckets whose window has
//! expired are swept at most once per window, so the map holds only callers
//! seen recently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::auth::CallerIdentity;
use crate::error::ErrorBody;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u64,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 1000,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
struct BucketState {
    count: u64,
    window_start: Instant,
}

#[derive(Debug)]
struct Buckets {
    by_key: HashMap<String, BucketState>,
    last_sweep: Instant,
}

/// Shared rate limiter state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<Buckets>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(Buckets {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            })),
        }
    }

    /// Check if a request from the given key should be allowed.
    fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let window = self.config.window;
        let mut buckets = self.buckets.lock();
        if now.saturating_duration_since(buckets.last_sweep) >= window {
            buckets
                .by_key
                .retain(|_, b| now.saturating_duration_since(b.window_start) < window);
            buckets.last_sweep = now;
        }

        let bucket = buckets.by_key.entry(key.to_string()).or_insert(BucketState {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(bucket.window_start) >= window {
            bucket.count = 0;
            bucket.window_start = now;
        }

        if bucket.count >= self.config.max_requests {
            false
        } else {
            bucket.count += 1;
            true
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.buckets.lock().by_key.len()
    }
}

fn bucket_key(identity: Option<&CallerIdentity>) -> String {
    match identity {
        Some(CallerIdentity {
            user_id: Some(user),
            ..
        }) => user.to_string(),
        Some(caller) => caller.role.as_str().to_string(),
        None => "anonymous".to_string(),
    }
}

/// Middleware that enforces per-caller rate limits.
///
/// Runs after authentication so the bucket key is the resolved identity.
pub async fn rate_limit_middleware(request: Request, next: Next) -> Response {
    if let Some(limiter) = request.extensions().get::<RateLimiter>().cloned() {
        let key = bucket_key(request.extensions().get::<CallerIdentity>());
        if !limiter.check(&key) {
            tracing::warn!(bucket = %key, "rate limit exceeded");
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorBody::new("RATE_LIMITED", "rate limit exceeded")),
            )
                .into_response();
        }
    }

    next.run(request).await
}
