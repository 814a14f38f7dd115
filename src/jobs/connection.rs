use url::Url;

use super::error::{QueueError, QueueResult};

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Connection parameters derived from the single `REDIS_URL` setting.
///
/// Accepts both URL form (`redis://:secret@cache:6380/2`, `rediss://...`) and
/// the bare `host:port` shorthand. A missing or unparsable port falls back to 6379.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: i64,
}

impl std::fmt::Debug for RedisEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .finish()
    }
}

impl RedisEndpoint {
    pub fn parse(raw: &str) -> QueueResult<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| QueueError::InvalidUrl { url: raw.to_string(), reason: reason.to_string() };

        if raw.contains("://") {
            let url = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
            let tls = match url.scheme() {
                "redis" => false,
                "rediss" => true,
                other => return Err(invalid(&format!("unsupported scheme {}", other))),
            };
            let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(|| invalid("missing host"))?;
            let db = match url.path().trim_start_matches('/') {
                "" => 0,
                p => p.parse::<i64>().map_err(|_| invalid("database must be a number"))?,
            };
            let username = Some(url.username()).filter(|u| !u.is_empty()).map(str::to_string);
            Ok(Self {
                host: host.to_string(),
                port: url.port().unwrap_or(DEFAULT_REDIS_PORT),
                tls,
                username,
                password: url.password().map(str::to_string),
                db,
            })
        } else {
            let mut parts = raw.splitn(2, ':');
            let host = parts.next().unwrap_or_default().trim();
            if host.is_empty() {
                return Err(invalid("missing host"));
            }
            let port = parts.next().and_then(|p| p.trim().parse::<u16>().ok()).unwrap_or(DEFAULT_REDIS_PORT);
            Ok(Self { host: host.to_string(), port, tls: false, username: None, password: None, db: 0 })
        }
    }

    /// Canonical URL understood by the redis client.
    pub fn to_url(&self) -> String {
        let scheme = if self.tls { "rediss" } else { "redis" };
        let auth = match (&self.username, &self.password) {
            (Some(u), Some(p)) => format!("{}:{}@", u, p),
            (None, Some(p)) => format!(":{}@", p),
            (Some(u), None) => format!("{}@", u),
            (None, None) => String::new(),
        };
        format!("{}://{}{}:{}/{}", scheme, auth, self.host, self.port, self.db)
    }
}
