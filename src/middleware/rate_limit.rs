use super::ip::{extract_ip_from_headers, MaybeRemoteAddr};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::state::AppState;

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Time until the oldest counted request leaves the window.
    pub reset_after: Duration,
}

impl RateDecision {
    /// Whole seconds until the window frees a slot, never 0.
    pub fn reset_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }

    /// Set the standard `RateLimit-*` headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap, window: Duration) {
        headers.insert(HeaderName::from_static("ratelimit-limit"), HeaderValue::from(self.limit));
        headers.insert(HeaderName::from_static("ratelimit-remaining"), HeaderValue::from(self.remaining));
        headers.insert(HeaderName::from_static("ratelimit-reset"), HeaderValue::from(self.reset_secs()));
        if let Ok(policy) = HeaderValue::from_str(&format!("{};w={}", self.limit, window.as_secs())) {
            headers.insert(HeaderName::from_static("ratelimit-policy"), policy);
        }
    }
}

/// A thread-safe per-client rate limiter based on the sliding window algorithm.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<IpAddr, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self { requests: Arc::new(RwLock::new(HashMap::new())), max_requests, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request from `ip` unless the window is already full.
    pub async fn check(&self, ip: IpAddr) -> RateDecision {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        let timestamps = requests.entry(ip).or_default();

        // On clock skew keep the timestamp; erring towards limiting
        timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));

        let allowed = timestamps.len() < self.max_requests;
        if allowed {
            timestamps.push(now);
        }

        let oldest = timestamps.first().copied().unwrap_or(now);
        let reset_after = match now.checked_duration_since(oldest) {
            Some(elapsed) => self.window.saturating_sub(elapsed),
            None => self.window,
        };

        RateDecision {
            allowed,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(timestamps.len()),
            reset_after,
        }
    }

    /// Drop clients with no requests left in the window.
    pub async fn cleanup_old_entries(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, timestamps| {
            timestamps.retain(|&t| now.checked_duration_since(t).map(|d| d < self.window).unwrap_or(true));
            !timestamps.is_empty()
        });
    }

    pub async fn tracked_clients(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Global per-client limit. Every response carries `RateLimit-*` headers; a full
/// window answers 429 with `Retry-After`.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    MaybeRemoteAddr(remote): MaybeRemoteAddr,
    req: Request,
    next: Next,
) -> Response {
    let ip = extract_ip_from_headers(req.headers(), remote.map(|addr| addr.ip()));
    let decision = state.rate_limiter.check(ip).await;

    let mut res = if decision.allowed {
        next.run(req).await
    } else {
        state.metrics.inc_rate_limited();
        tracing::warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
        AppError::RateLimited { retry_after_seconds: decision.reset_secs() }.into_response()
    };
    decision.apply_headers(res.headers_mut(), state.rate_limiter.window());
    res
}
