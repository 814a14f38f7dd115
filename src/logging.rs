//! Log sinks.
//!
//! stdout always; `error.log` and `combined.log` under `LOG_DIR` in production;
//! `exceptions.log` (panics) and `rejections.log` (failed background tasks) in
//! every environment. Events reach the last two by target, see [`CRASH_TARGET`]
//! and [`REJECTION_TARGET`].

use std::any::Any;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{filter_fn, LevelFilter};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{Environment, LoggingConfig};

/// Target of panic reports.
pub const CRASH_TARGET: &str = "crash";
/// Target of failures in spawned tasks that nobody awaits.
pub const REJECTION_TARGET: &str = "rejection";

/// Keeps the non-blocking writers flushing. Hold it until the process exits.
#[must_use = "dropping the guards stops log output"]
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

pub fn init(cfg: &LoggingConfig, env: Environment) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&cfg.dir)?;
    let mut guards = Vec::new();

    let level = cfg.level.as_str();
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http={level},sqlx=warn")));

    let (stdout_nb, guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(guard);
    let stdout_text = (env == Environment::Development).then(|| fmt::layer().with_writer(stdout_nb.clone()));
    let stdout_json = (env != Environment::Development).then(|| fmt::layer().json().with_writer(stdout_nb));

    let (error_file, combined_file) = if env == Environment::Production {
        let (error_nb, error_guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&cfg.dir, "error.log"));
        let (combined_nb, combined_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(&cfg.dir, "combined.log"));
        guards.push(error_guard);
        guards.push(combined_guard);
        (
            Some(fmt::layer().json().with_ansi(false).with_writer(error_nb).with_filter(LevelFilter::ERROR)),
            Some(fmt::layer().json().with_ansi(false).with_writer(combined_nb)),
        )
    } else {
        (None, None)
    };

    let (crash_nb, crash_guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&cfg.dir, "exceptions.log"));
    let (rejection_nb, rejection_guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&cfg.dir, "rejections.log"));
    guards.push(crash_guard);
    guards.push(rejection_guard);
    let crash_file = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(crash_nb)
        .with_filter(filter_fn(|meta| meta.target() == CRASH_TARGET));
    let rejection_file = fmt::layer()
        .json()
        .with_ansi(false)
        .with_writer(rejection_nb)
        .with_filter(filter_fn(|meta| meta.target() == REJECTION_TARGET));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_text)
        .with(stdout_json)
        .with(error_file)
        .with(combined_file)
        .with(crash_file)
        .with(rejection_file)
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging is already initialized: {}", e))?;

    Ok(LogGuards { _guards: guards })
}

/// Record panics (message, location, thread) on [`CRASH_TARGET`], then defer to the default hook.
pub fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_default();
        let thread = std::thread::current();
        tracing::error!(
            target: CRASH_TARGET,
            thread = thread.name().unwrap_or("<unnamed>"),
            location = %location,
            "Uncaught panic: {}",
            panic_message(info.payload())
        );
        default_hook(info);
    }));
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
