use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use crate::clock::Clock;
use crate::server::ApiError;

/// Sliding-window request counter keyed by caller.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    hits: Arc<Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether `caller_key` may make another request now.
    ///
    /// Accepted requests are recorded; refused ones are not, so a caller
    /// that keeps retrying regains budget as its old requests age out.
    pub async fn is_within_budget(&self, caller_key: &str) -> bool {
        let now = self.clock.now();
        let window = TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX);
        let window_start = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut hits = self.hits.lock().await;
        hits.retain(|_, times| times.back().is_some_and(|last| *last > window_start));

        let times = hits.entry(caller_key.to_string()).or_default();
        while times.front().is_some_and(|first| *first <= window_start) {
            times.pop_front();
        }

        if times.len() >= self.max_requests {
            return false;
        }
        times.push_back(now);
        true
    }
}

/// Peer IP if the server was started with connect info, else the first
/// `x-forwarded-for` entry, else `"unknown"`.
fn caller_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| "unknown".to_string(), ToOwned::to_owned)
}

/// Middleware refusing callers that exceed their request budget.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let caller = caller_key(&req);
    if !rate_limit.is_within_budget(&caller).await {
        warn!(caller = %caller, "rate limit exceeded");
        return ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please wait a minute before trying again.",
        )
        .retry_after(rate_limit.window().as_secs())
        .into_response();
    }

    next.run(req).await
}
