//! Error types for the adaptive cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache layer and its HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Remote fetch failed and no cached value existed to fall back to
    #[error("Fetch failed for '{key}': {message}")]
    Fetch { key: String, message: String },

    /// Network-first fetch exceeded its deadline and nothing was cached
    #[error("Fetch for '{key}' timed out after {timeout_ms}ms")]
    Timeout { key: String, timeout_ms: u64 },

    /// Cache key rejected before touching the store
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Persistence substrate failed
    #[error("Store error: {0}")]
    Store(String),

    /// Value could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Builds a fetch error from whatever the caller's fetch function returned.
    pub fn fetch(key: impl Into<String>, err: &anyhow::Error) -> Self {
        CacheError::Fetch {
            key: key.into(),
            message: format!("{:#}", err),
        }
    }

    /// Builds a store error from an I/O failure.
    pub fn store(context: &str, err: impl std::fmt::Display) -> Self {
        CacheError::Store(format!("{}: {}", context, err))
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            CacheError::InvalidKey(_) | CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Store(_) | CacheError::Serialization(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
