//! Upstream API client.
//!
//! The fetch function the demo server hands to the cache strategies: a plain
//! JSON GET against a base URL.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// HTTP request timeout in seconds.
/// Network-first applies its own shorter deadline on top of this.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum length of an upstream error body quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Client for the upstream JSON API.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an upstream path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GETs `path` and parses the body as JSON. Non-2xx statuses are errors.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url_for(path);
        debug!(url = %url, "Fetching from upstream");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            return Err(anyhow!("GET {} returned {}: {}", url, status, body));
        }

        response
            .json::<Value>()
            .await
            .with_context(|| format!("Invalid JSON from {}", url))
    }
}
