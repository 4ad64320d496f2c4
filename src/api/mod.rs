//! API Module
//!
//! HTTP handlers and routing for the caching proxy and its admin surface.
//!
//! # Endpoints
//! - `GET /fetch/*path` - Fetch through the cache
//! - `PUT /set` - Precache a value
//! - `GET /get/:key` - Raw read
//! - `DELETE /del/:key` - Invalidate one key
//! - `DELETE /invalidate?pattern=` - Invalidate by substring
//! - `POST /clear` - Invalidate everything
//! - `GET /stats` - Cache statistics
//! - `GET /introspect` - Tracked keys and ages
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
