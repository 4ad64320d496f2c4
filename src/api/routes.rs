//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, fetch_handler, get_handler, health_handler,
    introspect_handler, invalidate_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /fetch/*path` - Fetch through the cache with a chosen strategy
/// - `PUT /set` - Precache a value
/// - `GET /get/:key` - Raw read of a cached value
/// - `DELETE /del/:key` - Invalidate one key
/// - `DELETE /invalidate?pattern=` - Invalidate keys containing a substring
/// - `POST /clear` - Invalidate everything
/// - `GET /stats` - Cache statistics
/// - `GET /introspect` - Every tracked key with its age
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/fetch/*path", get(fetch_handler))
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/invalidate", delete(invalidate_handler))
        .route("/clear", post(clear_handler))
        .route("/stats", get(stats_handler))
        .route("/introspect", get(introspect_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
