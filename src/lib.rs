//! Adaptive Cache - client-side caching between UI code and a remote API
//!
//! Persists fetched values, tracks their age per resource type, and serves
//! them with one of three strategies: cache-first, network-first or
//! stale-while-revalidate.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod upstream;

pub use api::AppState;
pub use cache::{AdaptiveCache, CacheOptions, PersistentStore, Strategy};
pub use config::Config;
pub use error::{CacheError, Result};
