//! Engine configuration.

use std::time::Duration;

pub const MIN_TIMEOUT_MS: u64 = 200;
pub const MAX_TIMEOUT_MS: u64 = 5000;
pub const MAX_CACHE_TTL_SECS: u64 = 30;

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 5;

/// Timeout and cache settings for a [`QueryEngine`](crate::engine::QueryEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Budget for one whole session, both phases combined.
    pub timeout: Duration,
    /// Zero disables caching.
    pub cache_ttl: Duration,
}

impl QueryConfig {
    /// Build a config, clamping values into their supported ranges.
    pub fn new(timeout_ms: u64, cache_ttl_secs: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS)),
            cache_ttl: Duration::from_secs(cache_ttl_secs.min(MAX_CACHE_TTL_SECS)),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS, DEFAULT_CACHE_TTL_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keeps_values_in_range() {
        let config = QueryConfig::new(750, 10);

        assert_eq!(config.timeout, Duration::from_millis(750));
        assert_eq!(config.cache_ttl, Duration::from_secs(10));
    }

    #[test]
    fn new_clamps_timeout() {
        assert_eq!(QueryConfig::new(0, 5).timeout, Duration::from_millis(200));
        assert_eq!(QueryConfig::new(60_000, 5).timeout, Duration::from_millis(5000));
    }

    #[test]
    fn new_clamps_ttl() {
        assert_eq!(QueryConfig::new(1000, 0).cache_ttl, Duration::ZERO);
        assert_eq!(QueryConfig::new(1000, 3600).cache_ttl, Duration::from_secs(30));
    }

    #[test]
    fn default_values() {
        let config = QueryConfig::default();

        assert_eq!(config.timeout, Duration::from_millis(1000));
        assert_eq!(config.cache_ttl, Duration::from_secs(5));
    }
}
