//! Fetch Strategies
//!
//! The three ways a caller can combine the cache with a remote fetch:
//!
//! | Strategy | Fresh entry | Stale entry | No entry | Fetch fails |
//! |----------|-------------|-------------|----------|-------------|
//! | cache-first | serve + background refresh | blocking fetch | blocking fetch | serve any stored value |
//! | network-first | blocking fetch | blocking fetch | blocking fetch | serve any stored value |
//! | stale-while-revalidate | serve + background refresh | serve + background refresh | blocking fetch | propagate |
//!
//! Fetch functions return `anyhow::Result<T>`. Whatever they fail with only
//! reaches the caller when there is nothing stored to fall back to.

use std::future::Future;
use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::layer::validate_key;
use crate::cache::{AdaptiveCache, CacheStats};
use crate::error::{CacheError, Result};

// == Strategy ==
/// Named strategy, for callers that pick one at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    #[default]
    CacheFirst,
    NetworkFirst,
    #[serde(alias = "swr")]
    StaleWhileRevalidate,
}

/// Options for [`AdaptiveCache::cache_first`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheFirstOptions {
    /// Skip the cache and fetch straight away
    pub force_refresh: bool,
}

/// Options for [`AdaptiveCache::network_first`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkFirstOptions {
    /// Deadline for the fetch; the cache's configured timeout when `None`
    pub timeout: Option<Duration>,
}

/// Union of per-strategy options for [`AdaptiveCache::fetch_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyOptions {
    pub force_refresh: bool,
    pub timeout: Option<Duration>,
}

impl AdaptiveCache {
    // == Cache First ==
    /// Serves a fresh stored value and refreshes it in the background;
    /// otherwise waits on `fetch`, falling back to any stored value if the
    /// fetch fails.
    pub async fn cache_first<T, F, Fut>(
        &self,
        key: &str,
        resource_type: &str,
        fetch: F,
        options: CacheFirstOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        validate_key(key)?;

        if !options.force_refresh {
            if let Some(cached) = self.read_stored::<T>(key).await {
                if self.is_valid(key, resource_type) {
                    debug!(key = %key, resource_type = %resource_type, "cache-first hit");
                    self.record(CacheStats::record_hit);
                    self.schedule_revalidation(key, fetch);
                    return Ok(cached);
                }
                debug!(key = %key, resource_type = %resource_type, "cache-first entry expired");
            }
        }

        self.record(CacheStats::record_miss);
        match self.fetch_and_store(key, fetch()).await {
            Ok(value) => Ok(value),
            Err(err) => self.fall_back_to_stored(key, err).await,
        }
    }

    // == Network First ==
    /// Races `fetch` against a deadline. A fresh result is stored and
    /// returned; on failure or timeout any stored value is served instead.
    pub async fn network_first<T, F, Fut>(
        &self,
        key: &str,
        resource_type: &str,
        fetch: F,
        options: NetworkFirstOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        validate_key(key)?;
        let timeout = options.timeout.unwrap_or(self.network_timeout());

        let outcome = match tokio::time::timeout(timeout, fetch()).await {
            Ok(result) => self.settle_fetch(key, result).await,
            Err(_) => {
                debug!(key = %key, resource_type = %resource_type, ?timeout, "network-first timed out");
                self.record(|s| s.record_fetch(false));
                Err(CacheError::Timeout {
                    key: key.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        match outcome {
            Ok(value) => Ok(value),
            Err(err) => self.fall_back_to_stored(key, err).await,
        }
    }

    // == Stale While Revalidate ==
    /// Serves any stored value, fresh or not, and always refreshes it in the
    /// background. Waits on `fetch` only when nothing is stored.
    pub async fn stale_while_revalidate<T, F, Fut>(
        &self,
        key: &str,
        resource_type: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        validate_key(key)?;

        if let Some(cached) = self.read_stored::<T>(key).await {
            debug!(key = %key, resource_type = %resource_type, "stale-while-revalidate serving stored value");
            self.record(CacheStats::record_hit);
            self.schedule_revalidation(key, fetch);
            return Ok(cached);
        }

        self.record(CacheStats::record_miss);
        self.fetch_and_store(key, fetch()).await
    }

    // == Dispatch ==
    /// Runs the named strategy.
    pub async fn fetch_with<T, F, Fut>(
        &self,
        strategy: Strategy,
        key: &str,
        resource_type: &str,
        fetch: F,
        options: StrategyOptions,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        match strategy {
            Strategy::CacheFirst => {
                let options = CacheFirstOptions {
                    force_refresh: options.force_refresh,
                };
                self.cache_first(key, resource_type, fetch, options).await
            }
            Strategy::NetworkFirst => {
                let options = NetworkFirstOptions {
                    timeout: options.timeout,
                };
                self.network_first(key, resource_type, fetch, options).await
            }
            Strategy::StaleWhileRevalidate => {
                self.stale_while_revalidate(key, resource_type, fetch).await
            }
        }
    }

    // == Internal Helpers ==

    /// Hands `fetch` to the scheduler. Its outcome is stored or logged and
    /// never seen by the caller that triggered it.
    fn schedule_revalidation<T, F, Fut>(&self, key: &str, fetch: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let cache = self.clone();
        let owned_key = key.to_string();
        self.scheduler().spawn(key, async move {
            match fetch().await {
                Ok(value) => {
                    let stored = match cache.encode(&owned_key, &value) {
                        Some(payload) => cache.write_entry(&owned_key, payload).await,
                        None => false,
                    };
                    cache.record(|s| s.record_background(stored));
                    debug!(key = %owned_key, stored, "Background revalidation finished");
                }
                Err(e) => {
                    cache.record(|s| s.record_background(false));
                    warn!(key = %owned_key, error = %format!("{:#}", e), "Background revalidation failed");
                }
            }
        });
    }

    async fn fetch_and_store<T, Fut>(&self, key: &str, fetch: Fut) -> Result<T>
    where
        T: Serialize,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let result = fetch.await;
        self.settle_fetch(key, result).await
    }

    /// Stores a successful fetch; turns a failed one into a `CacheError`.
    async fn settle_fetch<T: Serialize>(
        &self,
        key: &str,
        result: anyhow::Result<T>,
    ) -> Result<T> {
        self.record(|s| s.record_fetch(result.is_ok()));
        match result {
            Ok(value) => {
                if let Some(payload) = self.encode(key, &value) {
                    self.write_entry(key, payload).await;
                }
                Ok(value)
            }
            Err(e) => Err(CacheError::fetch(key, &e)),
        }
    }

    /// Serves whatever is stored for `key`, regardless of age, or returns
    /// `err` if nothing is.
    async fn fall_back_to_stored<T: DeserializeOwned>(&self, key: &str, err: CacheError) -> Result<T> {
        match self.read_stored::<T>(key).await {
            Some(value) => {
                warn!(key = %key, error = %err, "Serving stored value after failed fetch");
                self.record(CacheStats::record_stale_fallback);
                Ok(value)
            }
            None => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        let parse = |s: &str| serde_json::from_value::<Strategy>(serde_json::json!(s)).unwrap();
        assert_eq!(parse("cache-first"), Strategy::CacheFirst);
        assert_eq!(parse("network-first"), Strategy::NetworkFirst);
        assert_eq!(parse("stale-while-revalidate"), Strategy::StaleWhileRevalidate);
        assert_eq!(parse("swr"), Strategy::StaleWhileRevalidate);
        assert_eq!(Strategy::default(), Strategy::CacheFirst);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(serde_json::from_value::<Strategy>(serde_json::json!("lru")).is_err());
    }
}
