//! Cache Statistics Module
//!
//! Tracks how requests were served: from cache, from the network, or from a
//! stale fallback after the network let us down.

use serde::Serialize;

// == Cache Stats ==
/// Counters for diagnostics. None of them influence cache behaviour.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Requests answered from a stored value without a blocking fetch
    pub hits: u64,
    /// Requests that had to wait on a fetch
    pub misses: u64,
    /// Requests answered with a stored value after the fetch failed or timed out
    pub stale_fallbacks: u64,
    /// Foreground fetches attempted
    pub fetches: u64,
    /// Foreground fetches that failed or timed out
    pub fetch_failures: u64,
    /// Background revalidations that stored a fresh value
    pub background_refreshes: u64,
    /// Background revalidations that failed and were dropped
    pub background_failures: u64,
    /// Store reads/writes/removes that failed and were absorbed
    pub store_errors: u64,
    /// Keys currently tracked by the timestamp index
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_stale_fallback(&mut self) {
        self.stale_fallbacks += 1;
    }

    pub fn record_fetch(&mut self, ok: bool) {
        self.fetches += 1;
        if !ok {
            self.fetch_failures += 1;
        }
    }

    pub fn record_background(&mut self, ok: bool) {
        if ok {
            self.background_refreshes += 1;
        } else {
            self.background_failures += 1;
        }
    }

    pub fn record_store_error(&mut self) {
        self.store_errors += 1;
    }

    // == Update Entry Count ==
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
