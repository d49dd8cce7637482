use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub rate_limit: RateLimitConfig,
    pub dataset_cache_ttl: Duration,
    pub session_cookie: String,
    pub allowed_email_domain: Option<String>,
    pub trusted_ip_header: String,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 20,
            redis_url: None,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            rate_limit: RateLimitConfig {
                max_requests: 100,
                window: Duration::from_secs(60),
            },
            dataset_cache_ttl: Duration::from_secs(3600),
            session_cookie: "oa_session".to_string(),
            allowed_email_domain: None,
            trusted_ip_header: "x-forwarded-for".to_string(),
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Reads the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            redis_url: get("REDIS_URL"),
            bind_addr: parse_or(get("BIND_ADDR"), "BIND_ADDR", defaults.bind_addr)?,
            rate_limit: RateLimitConfig {
                max_requests: parse_or(get("RATE_LIMIT_REQUESTS"), "RATE_LIMIT_REQUESTS", defaults.rate_limit.max_requests)?,
                window: Duration::from_secs(parse_or(get("RATE_LIMIT_WINDOW_SECS"), "RATE_LIMIT_WINDOW_SECS", 60u64)?),
            },
            dataset_cache_ttl: Duration::from_secs(parse_or(get("DATASET_CACHE_TTL_SECS"), "DATASET_CACHE_TTL_SECS", 3600u64)?),
            session_cookie: get("SESSION_COOKIE").unwrap_or(defaults.session_cookie),
            allowed_email_domain: get("ALLOWED_EMAIL_DOMAIN"),
            trusted_ip_header: get("TRUSTED_IP_HEADER")
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or(defaults.trusted_ip_header),
            log_file: get("LOG_FILE"),
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(v) => v.parse().with_context(|| format!("{} has an invalid value: {}", key, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.dataset_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.session_cookie, "oa_session");
    }

    #[test]
    fn values_are_parsed() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/openalbion"),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW_SECS", "10"),
            ("TRUSTED_IP_HEADER", "CF-Connecting-IP"),
            ("ALLOWED_EMAIL_DOMAIN", "albion.edu"),
            ("REDIS_URL", "  "),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/openalbion"));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window, Duration::from_secs(10));
        assert_eq!(config.trusted_ip_header, "cf-connecting-ip");
        assert_eq!(config.allowed_email_domain.as_deref(), Some("albion.edu"));
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let err = load(&[("RATE_LIMIT_REQUESTS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_REQUESTS"));
    }
}
