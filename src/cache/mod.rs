//! Cache Module
//!
//! Client-side adaptive cache: a persisted key-value store fronted by a
//! timestamp index, a TTL table per resource type, and three fetch
//! strategies that decide when stored data can be trusted.

mod clock;
mod index;
mod layer;
pub mod policy;
mod report;
mod stats;
mod store;
mod strategy;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use index::TimestampIndex;
pub use layer::{
    validate_key, AdaptiveCache, CacheOptions, DEFAULT_NAMESPACE, DEFAULT_NETWORK_TIMEOUT,
};
pub use policy::{TtlPolicy, DEFAULT_TTL};
pub use report::{CacheReport, EntryReport};
pub use stats::CacheStats;
pub use store::{FileStore, MemoryStore, PersistentStore};
pub use strategy::{CacheFirstOptions, NetworkFirstOptions, Strategy, StrategyOptions};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Caller key reserved for the persisted timestamp index
pub const INDEX_KEY: &str = "__timestamps__";
