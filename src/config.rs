//! Configuration Module
//!
//! Loads cache and server settings from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheOptions, TtlPolicy};

/// TTL table used when `TTL_POLICIES` is unset.
pub const DEFAULT_TTL_POLICIES: &str =
    "categories=86400000,cities=86400000,banners=3600000,listings=30000";

/// Cache and server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Prefix for every storage key
    pub namespace: String,
    /// Directory backing the file store
    pub data_dir: PathBuf,
    /// TTL in milliseconds for resource types without a policy
    pub default_ttl_ms: u64,
    /// Network-first deadline in milliseconds
    pub network_timeout_ms: u64,
    /// `type=ms` pairs, comma separated
    pub ttl_policies: String,
    /// Base URL of the upstream API the proxy fetches from
    pub upstream_url: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_NAMESPACE` - storage key prefix (default: `cache_`)
    /// - `CACHE_DATA_DIR` - file store directory (default: `./cache-data`)
    /// - `DEFAULT_TTL_MS` - fallback TTL (default: 300000)
    /// - `NETWORK_TIMEOUT_MS` - network-first deadline (default: 5000)
    /// - `TTL_POLICIES` - per-type TTLs (default: [`DEFAULT_TTL_POLICIES`])
    /// - `UPSTREAM_URL` - upstream API (default: `http://127.0.0.1:8080`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            namespace: env::var("CACHE_NAMESPACE").unwrap_or(defaults.namespace),
            data_dir: env::var("CACHE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            default_ttl_ms: parse_var("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            network_timeout_ms: parse_var("NETWORK_TIMEOUT_MS")
                .unwrap_or(defaults.network_timeout_ms),
            ttl_policies: env::var("TTL_POLICIES").unwrap_or(defaults.ttl_policies),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
        }
    }

    /// Builds the TTL table from `default_ttl_ms` and `ttl_policies`.
    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::parse(Duration::from_millis(self.default_ttl_ms), &self.ttl_policies)
    }

    /// Builds the options for an [`AdaptiveCache`](crate::cache::AdaptiveCache).
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            namespace: self.namespace.clone(),
            policy: self.ttl_policy(),
            network_timeout: Duration::from_millis(self.network_timeout_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            namespace: "cache_".to_string(),
            data_dir: PathBuf::from("./cache-data"),
            default_ttl_ms: 300_000,
            network_timeout_ms: 5_000,
            ttl_policies: DEFAULT_TTL_POLICIES.to_string(),
            upstream_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.namespace, "cache_");
        assert_eq!(config.default_ttl_ms, 300_000);
        assert_eq!(config.network_timeout_ms, 5_000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for var in [
            "SERVER_PORT",
            "CACHE_NAMESPACE",
            "CACHE_DATA_DIR",
            "DEFAULT_TTL_MS",
            "NETWORK_TIMEOUT_MS",
            "TTL_POLICIES",
            "UPSTREAM_URL",
        ] {
            env::remove_var(var);
        }

        let config = Config::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("./cache-data"));
        assert_eq!(config.ttl_policies, DEFAULT_TTL_POLICIES);
        assert_eq!(config.upstream_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_default_policy_table() {
        let policy = Config::default().ttl_policy();
        assert_eq!(policy.ttl_for("listings"), Duration::from_millis(30_000));
        assert_eq!(policy.ttl_for("categories"), Duration::from_secs(86_400));
        assert_eq!(policy.ttl_for("reviews"), Duration::from_millis(300_000));
    }

    #[test]
    fn test_cache_options() {
        let config = Config {
            namespace: "app_".to_string(),
            network_timeout_ms: 1_500,
            ..Config::default()
        };
        let options = config.cache_options();
        assert_eq!(options.namespace, "app_");
        assert_eq!(options.network_timeout, Duration::from_millis(1_500));
    }
}
