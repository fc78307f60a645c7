//! Read API configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::cache::CacheClass;

/// Main API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub http: HttpConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    /// Node build identifier surfaced on the resource endpoint.
    pub build_info: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cache: CacheConfig::default(),
            limits: LimitsConfig::default(),
            build_info: format!("chain-digest/v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.enabled && self.rate_limit.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_second cannot be 0".into(),
            ));
        }
        if self.limits.default_page_size == 0 || self.limits.max_page_size == 0 {
            return Err(ConfigError::InvalidLimit("page sizes cannot be 0".into()));
        }
        if self.limits.default_page_size > self.limits.max_page_size {
            return Err(ConfigError::InvalidLimit(
                "default_page_size exceeds max_page_size".into(),
            ));
        }
        if self.http.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "request timeout cannot be 0".into(),
            ));
        }
        Ok(())
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Per-request deadline propagated into store queries.
    pub request_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 54320,
            request_timeout_ms: 10_000,
        }
    }
}

/// Per-route token bucket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 1000,
            burst_size: 1000,
        }
    }
}

/// Response-cache TTLs. TTL expiry is the only invalidation, so each class
/// stays short enough to bound staleness to roughly one block interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Point lookups (current value by key).
    pub point_ttl_ms: u64,
    /// Pages that returned fewer than `limit` items and are likely to grow.
    pub not_filled_ttl_ms: u64,
    /// Pages that returned exactly `limit` items; their content is stable.
    pub filled_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            point_ttl_ms: 1_500,
            not_filled_ttl_ms: 1_000,
            filled_ttl_ms: 60_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, class: CacheClass) -> Duration {
        let ms = match class {
            CacheClass::Point => self.point_ttl_ms,
            CacheClass::PartialPage => self.not_filled_ttl_ms,
            CacheClass::FullPage => self.filled_ttl_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub default_page_size: u64,
    pub max_page_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: digest_engine::queries::MAX_LIMIT,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApiConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut config = ApiConfig::default();
        config.rate_limit.requests_per_second = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_ordering_enforced() {
        let mut config = ApiConfig::default();
        config.limits.default_page_size = config.limits.max_page_size + 1;
        assert!(config.validate().is_err());
    }
}
