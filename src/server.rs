use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tower::Layer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    normalize_path::NormalizePathLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::error::handle_panic;
use crate::middleware::{access_log, body_limit, error_details, rate_limit, security_headers, RateLimiter};
use crate::routes::{self, fallback::not_found};
use crate::signal::shutdown_signal;
use crate::state::AppState;

const RATE_LIMIT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
}

/// The full application: routes plus the middleware stack.
///
/// Outermost first: trailing-slash trimming, security headers, CORS, request
/// tracing, access log, compression, error details, panic catcher, rate limiter,
/// body limit.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit;
    let cors = cors_layer(&state.config.security.cors_origins);

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .nest("/api/auth", routes::auth::router())
        .nest("/api/receipts", routes::receipts::router())
        .nest("/api/products", routes::products::router())
        .nest("/api/warranties", routes::warranties::router())
        .nest("/api/notifications", routes::notifications::router())
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), body_limit::body_limit_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit::rate_limit_middleware))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(from_fn_with_state(state.clone(), error_details::expose_error_details))
        .layer(CompressionLayer::new())
        .layer(from_fn_with_state(state.clone(), access_log::access_log_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(from_fn(security_headers::security_headers_middleware))
        .with_state(state);

    // Route matching sees the trimmed path, so `/api/receipts/` hits `/api/receipts`.
    Router::new().fallback_service(NormalizePathLayer::trim_trailing_slash().layer(app))
}

fn spawn_rate_limit_sweeper(limiter: RateLimiter, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = time::interval(RATE_LIMIT_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => limiter.cleanup_old_entries().await,
            }
        }
    });
}

/// Bind `HOST:PORT` and serve until SIGINT or SIGTERM.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let cfg = state.config.clone();
    let listener = TcpListener::bind((cfg.server.host.as_str(), cfg.server.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", cfg.server.host, cfg.server.port))?;

    info!("Server running on port {} in {} mode", cfg.server.port, cfg.env);
    info!("Health check available at http://localhost:{}/health", cfg.server.port);

    let cancel = CancellationToken::new();
    spawn_rate_limit_sweeper(state.rate_limiter.clone(), cancel.clone());
    let result = run(listener, build_router(state), cfg.server.shutdown_timeout, shutdown_signal()).await;
    cancel.cancel();
    result
}

/// Serve `app` until `signal` resolves, then drain for at most `drain_timeout`.
pub async fn run<F>(listener: TcpListener, app: Router, drain_timeout: Duration, signal: F) -> anyhow::Result<()>
where
    F: Future<Output = &'static str>,
{
    let stop = CancellationToken::new();
    let graceful = stop.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
    });

    tokio::select! {
        name = signal => {
            info!("{} received. Starting graceful shutdown...", name);
        }
        res = &mut server => {
            // Server stopped on its own: nothing left to drain
            return match res {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(anyhow::anyhow!("server task failed: {}", e)),
            };
        }
    }
    stop.cancel();

    match time::timeout(drain_timeout, &mut server).await {
        Ok(Ok(Ok(()))) => {
            info!("HTTP server closed");
            Ok(())
        }
        Ok(Ok(Err(e))) => Err(e.into()),
        Ok(Err(e)) => Err(anyhow::anyhow!("server task failed: {}", e)),
        Err(_) => {
            error!("Could not close connections in time, forcefully shutting down");
            server.abort();
            Err(anyhow::anyhow!("could not close connections in time"))
        }
    }
}
