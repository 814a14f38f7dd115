use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::RateLimiter;

/// The shared application state, cloned into every handler and stateful middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Lazily connected; only `/readyz` uses it so far.
    pub db: PgPool,
    pub rate_limiter: RateLimiter,
    pub metrics: Metrics,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, db: PgPool) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window);
        Self { config: Arc::new(config), db, rate_limiter, metrics: Metrics::new(), started_at: Instant::now() }
    }
}
