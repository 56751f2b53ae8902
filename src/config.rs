//! Configuration Module
//!
//! Handles loading sync-layer configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::QueryOptions;

/// Sync-layer configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the dashboard REST API
    pub api_base_url: String,
    /// Maximum number of entries the query cache holds before LRU eviction
    pub max_entries: usize,
    /// Default staleness window in milliseconds
    pub stale_time_ms: u64,
    /// Grace period in milliseconds before an unsubscribed entry is evicted
    pub gc_time_ms: u64,
    /// Interval of the background eviction sweep in milliseconds
    pub eviction_interval_ms: u64,
    /// Debounce delay of the search field in milliseconds
    pub search_debounce_ms: u64,
    /// Poll interval of notification queries in milliseconds
    pub notifications_poll_ms: u64,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `API_BASE_URL` - API base URL (default: http://127.0.0.1:3000)
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 500)
    /// - `STALE_TIME_MS` - Staleness window (default: 30000)
    /// - `GC_TIME_MS` - Eviction grace period (default: 300000)
    /// - `EVICTION_INTERVAL_MS` - Eviction sweep frequency (default: 60000)
    /// - `SEARCH_DEBOUNCE_MS` - Search debounce delay (default: 300)
    /// - `NOTIFICATIONS_POLL_MS` - Notification poll interval (default: 30000)
    /// - `REQUEST_TIMEOUT_SECS` - HTTP timeout (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            stale_time_ms: parse_var("STALE_TIME_MS").unwrap_or(defaults.stale_time_ms),
            gc_time_ms: parse_var("GC_TIME_MS").unwrap_or(defaults.gc_time_ms),
            eviction_interval_ms: parse_var("EVICTION_INTERVAL_MS")
                .unwrap_or(defaults.eviction_interval_ms),
            search_debounce_ms: parse_var("SEARCH_DEBOUNCE_MS")
                .unwrap_or(defaults.search_debounce_ms),
            notifications_poll_ms: parse_var("NOTIFICATIONS_POLL_MS")
                .unwrap_or(defaults.notifications_poll_ms),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    /// Default per-query options derived from this configuration.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default().stale_time(Duration::from_millis(self.stale_time_ms))
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn notifications_poll(&self) -> Duration {
        Duration::from_millis(self.notifications_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".to_string(),
            max_entries: 500,
            stale_time_ms: 30_000,
            gc_time_ms: 300_000,
            eviction_interval_ms: 60_000,
            search_debounce_ms: 300,
            notifications_poll_ms: 30_000,
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://127.0.0.1:3000");
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.stale_time_ms, 30_000);
        assert_eq!(config.gc_time_ms, 300_000);
        assert_eq!(config.search_debounce(), Duration::from_millis(300));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("MAX_ENTRIES");
        env::remove_var("STALE_TIME_MS");
        env::remove_var("SEARCH_DEBOUNCE_MS");
        env::remove_var("NOTIFICATIONS_POLL_MS");

        let config = Config::from_env();
        assert_eq!(config.max_entries, 500);
        assert_eq!(config.stale_time_ms, 30_000);
        assert_eq!(config.search_debounce_ms, 300);
        assert_eq!(config.notifications_poll_ms, 30_000);
    }

    #[test]
    fn test_query_options_use_stale_time() {
        let config = Config {
            stale_time_ms: 1_500,
            ..Config::default()
        };
        let options = config.query_options();
        assert_eq!(options.stale_time, Duration::from_millis(1_500));
        assert!(options.refetch_interval.is_none());
    }
}
