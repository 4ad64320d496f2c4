//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, RawQuery, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{validate_key, AdaptiveCache, CacheReport, FileStore};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    upstream_target, DeleteResponse, FetchQuery, GetResponse, HealthResponse, InvalidateQuery,
    InvalidateResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::upstream::UpstreamClient;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Cache handle, cheap to clone
    pub cache: AdaptiveCache,
    /// Fetch source for the proxy endpoint
    pub upstream: UpstreamClient,
}

impl AppState {
    /// Creates a new AppState around an initialized cache.
    pub fn new(cache: AdaptiveCache, upstream: UpstreamClient) -> Self {
        Self { cache, upstream }
    }

    /// Opens the file store, builds the cache and loads its index.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = FileStore::open(&config.data_dir).await?;
        let cache = AdaptiveCache::new(Arc::new(store), config.cache_options());
        let loaded = cache.init().await;
        info!(
            "Cache ready: data_dir={}, entries={}, ttl_policies={}",
            config.data_dir.display(),
            loaded,
            cache.policy().len()
        );

        let upstream = UpstreamClient::new(config.upstream_url.clone())?;
        Ok(Self::new(cache, upstream))
    }
}

/// Handler for GET /fetch/*path
///
/// Answers from the cache or the upstream API according to the requested
/// strategy. The upstream path with its forwarded query parameters doubles
/// as the cache key.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<FetchQuery>,
    RawQuery(raw_query): RawQuery,
) -> Result<Json<Value>> {
    let resource_type = query.resource_type_for(&path);
    let target = upstream_target(&path, raw_query.as_deref());
    let upstream = state.upstream.clone();
    let upstream_path = target.clone();

    let value = state
        .cache
        .fetch_with(
            query.strategy,
            &target,
            &resource_type,
            move || async move { upstream.get_json(&upstream_path).await },
            query.options(),
        )
        .await?;

    Ok(Json(value))
}

/// Handler for PUT /set
///
/// Writes a value straight into the cache.
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .cache
        .precache(&req.key, &req.resource_type, &req.value)
        .await?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /get/:key
///
/// Raw read, never touches the upstream API.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    validate_key(&key)?;
    let value = state
        .cache
        .get_cache::<Value>(&key)
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Idempotent: invalidating an unknown key still succeeds.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.cache.invalidate(&key).await?;
    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /invalidate?pattern=...
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Query(query): Query<InvalidateQuery>,
) -> Result<Json<InvalidateResponse>> {
    // An empty substring matches everything; /clear exists for that.
    if query.pattern.is_empty() {
        return Err(CacheError::InvalidRequest(
            "Pattern cannot be empty".to_string(),
        ));
    }

    let removed = state.cache.invalidate_by_pattern(&query.pattern).await;
    Ok(Json(InvalidateResponse::pattern(query.pattern, removed)))
}

/// Handler for POST /clear
pub async fn clear_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let removed = state.cache.clear_all().await;
    Json(InvalidateResponse::cleared(removed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let pending = state.cache.scheduler().pending();
    Json(StatsResponse::new(state.cache.stats(), pending))
}

/// Handler for GET /introspect
pub async fn introspect_handler(State(state): State<AppState>) -> Json<CacheReport> {
    Json(state.cache.introspect())
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
