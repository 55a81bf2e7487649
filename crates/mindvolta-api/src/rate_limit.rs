//! Fixed-window rate limiter middleware.
//!
//! Each client gets its own budget of requests per window. Clients are keyed
//! by the authenticated user id, so the middleware runs after
//! [`require_auth`](crate::auth::require_auth). All windows share epoch-aligned
//! boundaries, so rolling over clears every client's count at once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthenticatedUser;

/// Bucket for requests that reach the limiter without an identity.
const ANONYMOUS: &str = "";

#[derive(Debug)]
struct Windows {
    /// Index of the current window (epoch seconds / window length).
    current: u64,
    /// Requests seen per client in the current window.
    counts: HashMap<String, u64>,
}

/// Shared state for the rate limiter.
#[derive(Clone)]
pub struct RateLimiter {
    /// Maximum requests allowed per client per window.
    max_per_window: u64,
    /// Window length in seconds.
    window_secs: u64,
    windows: Arc<Mutex<Windows>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u64, window_secs: u64) -> Self {
        Self {
            max_per_window,
            window_secs: window_secs.max(1),
            windows: Arc::new(Mutex::new(Windows {
                current: u64::MAX,
                counts: HashMap::new(),
            })),
        }
    }

    /// Try to acquire a permit for `client`. Returns true if the request is allowed.
    pub fn try_acquire(&self, client: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.try_acquire_at(client, now)
    }

    fn try_acquire_at(&self, client: &str, epoch_secs: u64) -> bool {
        let window = epoch_secs / self.window_secs;
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if window != windows.current {
            // New window: expired counts are dropped wholesale.
            windows.current = window;
            windows.counts.clear();
        }

        let count = windows.counts.entry(client.to_string()).or_insert(0);
        *count += 1;
        *count <= self.max_per_window
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap().counts.len()
    }
}

/// Axum middleware that enforces the rate limit per authenticated user.
pub async fn rate_limit_middleware(
    Extension(limiter): Extension<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let client = req
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.id().to_string())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    if limiter.try_acquire(&client) {
        next.run(req).await
    } else {
        tracing::debug!(user = %client, "Rate limit exceeded");
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "success": false,
                "error": "too_many_requests",
                "message": "Too many requests, please try again later"
            })),
        )
            .into_response()
    }
}
