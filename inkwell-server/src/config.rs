//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::{Ipv4Addr, SocketAddr};

use inkwell_core::{KeySetConfig, DEFAULT_CAPACITY, DEFAULT_EVICT_BATCH, DEFAULT_MEDIA_BASE_URL};

use crate::error::ApiError;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 50)
    pub body_limit_mb: usize,
    /// Maximum file size per upload in MB (default: 25)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests replenished per second per client IP (default: 10, max 1000)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// Maximum idempotency keys retained (default: 1000)
    pub dedup_capacity: usize,
    /// Oldest keys dropped when the ceiling is exceeded (default: 500)
    pub dedup_evict_batch: usize,
    /// Prefix for generated image URLs (default: /media)
    pub media_base_url: String,
    /// PostgreSQL URL; in-memory image storage when unset
    pub database_url: Option<String>,
    /// Database connection pool maximum connections (default: 20)
    pub database_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 50,
            max_file_size_mb: 25,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            dedup_capacity: DEFAULT_CAPACITY,
            dedup_evict_batch: DEFAULT_EVICT_BATCH,
            media_base_url: DEFAULT_MEDIA_BASE_URL.to_string(),
            database_url: None,
            database_max_connections: 20,
        }
    }
}

/// Parse an IPv4 bind address, keeping `fallback` when the value is invalid
fn parse_host(value: &str, fallback: [u8; 4]) -> [u8; 4] {
    match value.trim().parse::<Ipv4Addr>() {
        Ok(addr) => addr.octets(),
        Err(_) => {
            tracing::warn!(host = value, "Invalid HOST, falling back to {}", Ipv4Addr::from(fallback));
            fallback
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| parse_host(&h, defaults.host))
            .unwrap_or(defaults.host);

        let allowed_origins = std::env::var("ALLOWED_ORIGINS").ok().map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        let media_base_url = std::env::var("MEDIA_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.media_base_url);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.is_empty());

        Self {
            port: env_parse("PORT", defaults.port),
            host,
            allowed_origins,
            body_limit_mb: env_parse("BODY_LIMIT_MB", defaults.body_limit_mb),
            max_file_size_mb: env_parse("MAX_FILE_SIZE_MB", defaults.max_file_size_mb),
            timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: env_parse("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            dedup_capacity: env_parse("DEDUP_CAPACITY", defaults.dedup_capacity),
            dedup_evict_batch: env_parse("DEDUP_EVICT_BATCH", defaults.dedup_evict_batch),
            media_base_url,
            database_url,
            database_max_connections: env_parse(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
        }
    }

    /// Reject rate limiter settings the limiter cannot be built from
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.rate_limit_enabled {
            if self.rate_limit_per_sec == 0 {
                return Err(ApiError::bad_request("RATE_LIMIT_PER_SEC must be at least 1"));
            }
            if self.rate_limit_burst == 0 {
                return Err(ApiError::bad_request("RATE_LIMIT_BURST must be at least 1"));
            }
        }
        Ok(())
    }

    /// Interval between rate limiter replenishments, in milliseconds
    pub fn rate_limit_period_ms(&self) -> u64 {
        (1000 / self.rate_limit_per_sec.max(1)).max(1)
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum upload size in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Limits for the response idempotency key set
    pub fn key_set_config(&self) -> KeySetConfig {
        KeySetConfig {
            capacity: self.dedup_capacity,
            evict_batch: self.dedup_evict_batch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(!config.rate_limit_enabled);
        assert!(config.database_url.is_none());
        assert_eq!(config.media_base_url, "/media");
    }

    #[test]
    fn test_key_set_config_defaults() {
        let limits = Config::default().key_set_config();
        assert_eq!(limits.capacity, 1000);
        assert_eq!(limits.evict_batch, 500);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_max_file_size_bytes() {
        let config = Config {
            max_file_size_mb: 2,
            ..Config::default()
        };
        assert_eq!(config.max_file_size(), 2 * 1024 * 1024);
        assert_eq!(config.socket_addr().port(), 3000);
    }

    #[test]
    fn test_parse_host() {
        assert_eq!(parse_host("0.0.0.0", [127, 0, 0, 1]), [0, 0, 0, 0]);
        assert_eq!(parse_host("10.1.2.3", [127, 0, 0, 1]), [10, 1, 2, 3]);
        assert_eq!(parse_host("not-an-ip", [127, 0, 0, 1]), [127, 0, 0, 1]);
    }

    #[test]
    fn test_rate_limit_period() {
        let period = |rate| {
            Config {
                rate_limit_per_sec: rate,
                ..Config::default()
            }
            .rate_limit_period_ms()
        };
        assert_eq!(period(10), 100);
        assert_eq!(period(1), 1000);
        assert_eq!(period(5000), 1);
    }

    #[test]
    fn test_zero_rate_rejected_when_enabled() {
        let config = Config {
            rate_limit_enabled: true,
            rate_limit_per_sec: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let disabled = Config {
            rate_limit_per_sec: 0,
            ..Config::default()
        };
        assert!(disabled.validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }
}
