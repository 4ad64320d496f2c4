//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::sync::Arc;

use adaptive_cache::api::create_router;
use adaptive_cache::cache::{AdaptiveCache, CacheOptions, MemoryStore};
use adaptive_cache::upstream::UpstreamClient;
use adaptive_cache::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

/// Upstream that refuses connections, so every fetch fails.
const DEAD_UPSTREAM: &str = "http://127.0.0.1:9";

fn create_test_app() -> (Router, AdaptiveCache) {
    let cache = AdaptiveCache::new(Arc::new(MemoryStore::new()), CacheOptions::default());
    let upstream = UpstreamClient::new(DEAD_UPSTREAM).unwrap();
    let app = create_router(AppState::new(cache.clone(), upstream));
    (app, cache)
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET / GET ==

#[tokio::test]
async fn test_set_then_get() {
    let (app, _) = create_test_app();

    let response = app
        .clone()
        .oneshot(put_json(
            "/set",
            r#"{"key":"categories","resource_type":"categories","value":["food","bars"]}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("categories"));

    let response = app.oneshot(request("GET", "/get/categories")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "categories");
    assert_eq!(json["value"], serde_json::json!(["food", "bars"]));
}

#[tokio::test]
async fn test_set_empty_key_is_bad_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(put_json("/set", r#"{"key":"","value":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_get_reserved_key_is_bad_request() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request("GET", "/get/__timestamps__"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == Invalidation ==

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (app, cache) = create_test_app();
    cache.precache("banners", "banners", &1).await.unwrap();

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request("DELETE", "/del/banners"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(request("GET", "/get/banners")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalidate_by_pattern_endpoint() {
    let (app, cache) = create_test_app();
    for key in ["listings_page_1", "listings_page_2", "listing_detail_9"] {
        cache.precache(key, "listings", &key).await.unwrap();
    }

    let response = app
        .oneshot(request("DELETE", "/invalidate?pattern=listings_page"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);
    assert_eq!(json["pattern"], "listings_page");
    assert!(cache.stored_at("listing_detail_9").is_some());
}

#[tokio::test]
async fn test_clear_endpoint() {
    let (app, cache) = create_test_app();
    cache.precache("a", "t", &1).await.unwrap();
    cache.precache("b", "t", &2).await.unwrap();

    let response = app.oneshot(request("POST", "/clear")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 2);
    assert_eq!(cache.introspect().total_entries, 0);
}

// == Fetch ==

#[tokio::test]
async fn test_fetch_dead_upstream_without_cache_is_bad_gateway() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(request("GET", "/fetch/listings/page/1?strategy=network-first"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("listings/page/1"));
}

#[tokio::test]
async fn test_fetch_swr_serves_cached_value() {
    let (app, cache) = create_test_app();
    cache
        .precache("listings/page/1", "listings", &serde_json::json!([{"id": 1}]))
        .await
        .unwrap();

    let response = app
        .oneshot(request("GET", "/fetch/listings/page/1?strategy=swr"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json[0]["id"], 1);

    // The background refresh against the dead upstream fails quietly
    cache.scheduler().wait_idle().await;
    assert_eq!(cache.stats().background_failures, 1);
    assert!(cache.get_cache::<Value>("listings/page/1").await.is_some());
}

#[tokio::test]
async fn test_fetch_caches_each_query_separately() {
    let (app, cache) = create_test_app();
    cache
        .precache("listings?page=2", "listings", &serde_json::json!(["second"]))
        .await
        .unwrap();

    // Dead upstream: network-first falls back to the stored page 2
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/fetch/listings?page=2&strategy=network-first&timeout_ms=1000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!(["second"]));

    // Page 3 was never stored, so it must not be served page 2
    let response = app
        .oneshot(request("GET", "/fetch/listings?page=3&strategy=network-first"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("listings?page=3"));
}

// == Diagnostics ==

#[tokio::test]
async fn test_introspect_lists_entries() {
    let (app, cache) = create_test_app();
    cache.precache("cities", "cities", &["Paris"]).await.unwrap();

    let response = app.oneshot(request("GET", "/introspect")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["entries"][0]["key"], "cities");
    assert_eq!(json["entries"][0]["is_valid"], true);
    assert!(json["entries"][0]["age_ms"].is_u64());
}

#[tokio::test]
async fn test_stats_endpoint() {
    let (app, cache) = create_test_app();
    cache.precache("cities", "cities", &["Paris"]).await.unwrap();

    let response = app.oneshot(request("GET", "/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_entries"], 1);
    assert_eq!(json["hits"], 0);
    assert!(json.get("hit_rate").is_some());
    assert!(json.get("pending_revalidations").is_some());
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = create_test_app();

    let response = app.oneshot(request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
}
