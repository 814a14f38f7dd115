use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::jobs::{Backoff, RetryPolicy};

const DEFAULTS: &str = include_str!("../config/default.toml");
const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(anyhow::anyhow!("NODE_ENV must be one of development, production, test (got '{}')", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(anyhow::anyhow!("LOG_LEVEL must be one of error, warn, info, debug (got '{}')", other)),
        }
    }
}

/// Access log line formats, named after their morgan counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLogFormat {
    Combined,
    Common,
    Short,
    Tiny,
    Dev,
}

impl FromStr for AccessLogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(AccessLogFormat::Combined),
            "common" => Ok(AccessLogFormat::Common),
            "short" => Ok(AccessLogFormat::Short),
            "tiny" => Ok(AccessLogFormat::Tiny),
            "dev" => Ok(AccessLogFormat::Dev),
            other => Err(anyhow::anyhow!(
                "LOG_FORMAT must be one of combined, common, short, tiny, dev (got '{}')",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub client_url: String,
    pub body_limit: usize,
    pub shutdown_timeout: Duration,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expires_in: Duration,
    pub refresh_token_expires_in: Duration,
    pub bcrypt_rounds: u32,
}

#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub pass: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: u64,
    pub allowed_file_types: Vec<String>,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub language: String,
    pub confidence_threshold: f64,
    pub psm: u32,
}

#[derive(Clone)]
pub struct UpcConfig {
    pub api_key: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Days before expiry at which reminders go out, e.g. `[30, 7, 1]`.
    pub reminder_days: Vec<u32>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: AccessLogFormat,
    pub dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub redis_prefix: String,
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
    pub uploads: UploadConfig,
    pub ocr: OcrConfig,
    pub upc: UpcConfig,
    pub notifications: NotificationConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub rate_limit: RateLimitConfig,
    pub queues: QueueConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }

    pub fn is_production(&self) -> bool {
        self.env == Environment::Production
    }
}

const REDACTED: &str = "<redacted>";

/// Hide the password component of a connection URL.
fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut u) if u.password().is_some() => {
            let _ = u.set_password(Some(REDACTED));
            u.to_string()
        }
        Ok(u) => u.to_string(),
        Err(_) => REDACTED.to_string(),
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig").field("url", &redact_url(&self.url)).finish()
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig").field("url", &redact_url(&self.url)).finish()
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &REDACTED)
            .field("jwt_expires_in", &self.jwt_expires_in)
            .field("refresh_token_expires_in", &self.refresh_token_expires_in)
            .field("bcrypt_rounds", &self.bcrypt_rounds)
            .finish()
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &REDACTED)
            .field("from", &self.from)
            .finish()
    }
}

impl fmt::Debug for UpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpcConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Flat view of the settings, one field per environment variable (lowercased).
#[derive(Deserialize)]
struct EnvVars {
    node_env: String,
    host: String,
    port: u16,
    client_url: String,
    database_url: Option<String>,
    redis_url: String,
    jwt_secret: Option<String>,
    jwt_expires_in: String,
    refresh_token_expires_in: String,
    bcrypt_rounds: u32,
    smtp_host: String,
    smtp_port: u16,
    smtp_secure: bool,
    smtp_user: String,
    smtp_pass: String,
    email_from: String,
    max_file_size: String,
    allowed_file_types: String,
    upload_dir: String,
    ocr_language: String,
    ocr_confidence_threshold: f64,
    ocr_psm: u32,
    upc_api_key: Option<String>,
    upc_api_url: String,
    notification_reminder_days: String,
    cors_origins: String,
    log_level: String,
    log_format: String,
    log_dir: String,
    rate_limit_max_requests: usize,
    rate_limit_window_seconds: u64,
    body_limit: String,
    shutdown_timeout_seconds: u64,
    queue_prefix: String,
    queue_poll_interval_ms: u64,
    job_max_attempts: u32,
    job_backoff: String,
    job_backoff_delay_ms: u64,
    job_backoff_max_delay_ms: u64,
    job_dead_letter: bool,
}

/// Load settings from `.env`, the process environment and the embedded defaults.
pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();
    load_from(std::env::vars())
}

/// Like [`load`], but reads variables from `vars` instead of the process environment.
/// Names are matched case-insensitively.
pub fn load_from<I, K, V>(vars: I) -> anyhow::Result<AppConfig>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    build(vars.into_iter().map(|(k, v)| (k.into().to_lowercase(), v.into())).collect())
}

fn build(vars: ::config::Map<String, String>) -> anyhow::Result<AppConfig> {
    let cfg = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Environment variables last to have highest precedence
        .add_source(::config::Environment::default().ignore_empty(true).source(Some(vars)))
        .build()?;
    let raw: EnvVars = cfg.try_deserialize()?;
    let app_cfg = resolve(raw)?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

fn resolve(raw: EnvVars) -> anyhow::Result<AppConfig> {
    let database_url = raw
        .database_url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required"))?;
    let jwt_secret = raw.jwt_secret.ok_or_else(|| anyhow::anyhow!("JWT_SECRET is required"))?;

    let backoff = match raw.job_backoff.trim().to_ascii_lowercase().as_str() {
        "fixed" => Backoff::Fixed { delay: Duration::from_millis(raw.job_backoff_delay_ms) },
        "exponential" => Backoff::Exponential {
            base: Duration::from_millis(raw.job_backoff_delay_ms),
            max: Duration::from_millis(raw.job_backoff_max_delay_ms),
        },
        other => return Err(anyhow::anyhow!("JOB_BACKOFF must be fixed or exponential (got '{}')", other)),
    };

    Ok(AppConfig {
        env: raw.node_env.parse()?,
        server: ServerConfig {
            host: raw.host,
            port: raw.port,
            client_url: raw.client_url,
            body_limit: usize::try_from(parse_size(&raw.body_limit, "BODY_LIMIT")?)?,
            shutdown_timeout: Duration::from_secs(raw.shutdown_timeout_seconds),
        },
        database: DatabaseConfig { url: database_url },
        redis: RedisConfig { url: raw.redis_url },
        auth: AuthConfig {
            jwt_secret,
            jwt_expires_in: parse_duration(&raw.jwt_expires_in, "JWT_EXPIRES_IN")?,
            refresh_token_expires_in: parse_duration(&raw.refresh_token_expires_in, "REFRESH_TOKEN_EXPIRES_IN")?,
            bcrypt_rounds: raw.bcrypt_rounds,
        },
        smtp: SmtpConfig {
            host: raw.smtp_host,
            port: raw.smtp_port,
            secure: raw.smtp_secure,
            user: raw.smtp_user,
            pass: raw.smtp_pass,
            from: raw.email_from,
        },
        uploads: UploadConfig {
            max_file_size: parse_size(&raw.max_file_size, "MAX_FILE_SIZE")?,
            allowed_file_types: split_list(&raw.allowed_file_types),
            dir: PathBuf::from(raw.upload_dir),
        },
        ocr: OcrConfig {
            language: raw.ocr_language,
            confidence_threshold: raw.ocr_confidence_threshold,
            psm: raw.ocr_psm,
        },
        upc: UpcConfig { api_key: raw.upc_api_key, api_url: raw.upc_api_url },
        notifications: NotificationConfig { reminder_days: parse_reminder_days(&raw.notification_reminder_days)? },
        security: SecurityConfig { cors_origins: split_list(&raw.cors_origins) },
        logging: LoggingConfig {
            level: raw.log_level.parse()?,
            format: raw.log_format.parse()?,
            dir: PathBuf::from(raw.log_dir),
        },
        rate_limit: RateLimitConfig {
            max_requests: raw.rate_limit_max_requests,
            window: Duration::from_secs(raw.rate_limit_window_seconds),
        },
        queues: QueueConfig {
            redis_prefix: raw.queue_prefix,
            poll_interval: Duration::from_millis(raw.queue_poll_interval_ms),
            retry: RetryPolicy { max_attempts: raw.job_max_attempts, backoff, dead_letter: raw.job_dead_letter },
        },
    })
}

fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid PORT: {}", cfg.server.port));
    }
    // Warn for privileged ports on Unix-like systems
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.body_limit == 0 {
        return Err(anyhow::anyhow!("BODY_LIMIT must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_secret.chars().count() < MIN_JWT_SECRET_LEN {
        return Err(anyhow::anyhow!("JWT_SECRET must be at least {} characters", MIN_JWT_SECRET_LEN));
    }

    if !is_email(&cfg.smtp.from) {
        return Err(anyhow::anyhow!("EMAIL_FROM must be an email address (got '{}')", cfg.smtp.from));
    }

    if !(0.0..=100.0).contains(&cfg.ocr.confidence_threshold) {
        return Err(anyhow::anyhow!("OCR_CONFIDENCE_THRESHOLD must be in 0..=100"));
    }

    // Rate limiting
    if cfg.rate_limit.max_requests == 0 {
        return Err(anyhow::anyhow!("RATE_LIMIT_MAX_REQUESTS must be > 0"));
    }
    if cfg.rate_limit.window.is_zero() {
        return Err(anyhow::anyhow!("RATE_LIMIT_WINDOW_SECONDS must be > 0"));
    }

    // Queues
    if cfg.queues.retry.max_attempts == 0 {
        return Err(anyhow::anyhow!("JOB_MAX_ATTEMPTS must be >= 1"));
    }
    if cfg.queues.poll_interval.is_zero() {
        return Err(anyhow::anyhow!("QUEUE_POLL_INTERVAL_MS must be > 0"));
    }
    if cfg.queues.redis_prefix.trim().is_empty() {
        return Err(anyhow::anyhow!("QUEUE_PREFIX must not be empty"));
    }

    Ok(())
}

/// Split a comma list, trimming items and dropping empty ones.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

fn parse_reminder_days(raw: &str) -> anyhow::Result<Vec<u32>> {
    split_list(raw)
        .iter()
        .map(|item| {
            item.parse::<u32>()
                .map_err(|_| anyhow::anyhow!("NOTIFICATION_REMINDER_DAYS has an invalid entry: '{}'", item))
        })
        .collect()
}

/// Parse `10MB`, `512kb`, `1GB` or a plain byte count. Units are 1024-based.
pub fn parse_size(raw: &str, name: &str) -> anyhow::Result<u64> {
    let s = raw.trim().to_ascii_uppercase();
    let (digits, multiplier) = if let Some(n) = s.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1)
    } else {
        (s.as_str(), 1)
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} is not a valid size: '{}'", name, raw))?;
    n.checked_mul(multiplier).ok_or_else(|| anyhow::anyhow!("{} is too large: '{}'", name, raw))
}

/// Parse `30s`, `15m`, `12h`, `7d` or a plain number of seconds.
pub fn parse_duration(raw: &str, name: &str) -> anyhow::Result<Duration> {
    let s = raw.trim().to_ascii_lowercase();
    let (digits, unit) = match s.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&s[..i], c),
        _ => (s.as_str(), 's'),
    };
    let secs_per_unit = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(anyhow::anyhow!("{} has an unknown unit: '{}'", name, raw)),
    };
    let n: u64 = digits
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} is not a valid duration: '{}'", name, raw))?;
    n.checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| anyhow::anyhow!("{} is too large: '{}'", name, raw))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else { return false };
    !local.is_empty()
        && !s.chars().any(char::is_whitespace)
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
