//! Timestamp Index Module
//!
//! Tracks when each cache key was last written. The index is the only place
//! that knows which keys exist, so pattern invalidation enumerates it instead
//! of the store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

// == Timestamp Index ==
/// In-memory `key -> stored_at` map, persisted as an ordered list of pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampIndex {
    entries: BTreeMap<String, u64>,
}

/// On-disk shape: `[["key", 1700000000000], ...]`
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct PersistedIndex(Vec<(String, u64)>);

impl TimestampIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a persisted index. Later duplicates win.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let PersistedIndex(pairs) = serde_json::from_slice(bytes)?;
        Ok(Self {
            entries: pairs.into_iter().collect(),
        })
    }

    /// Encodes the whole index for the reserved storage key.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let pairs = self
            .entries
            .iter()
            .map(|(k, ts)| (k.clone(), *ts))
            .collect();
        Ok(serde_json::to_vec(&PersistedIndex(pairs))?)
    }

    /// Timestamp of the last write for `key`.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.entries.get(key).copied()
    }

    /// Records a write. Overwrites any earlier timestamp.
    pub fn record(&mut self, key: &str, stored_at: u64) {
        self.entries.insert(key.to_string(), stored_at);
    }

    /// Forgets a key. Returns whether it was tracked.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys containing `pattern` as a plain substring.
    pub fn keys_matching(&self, pattern: &str) -> Vec<String> {
        self.entries
            .keys()
            .filter(|k| k.contains(pattern))
            .cloned()
            .collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, ts)| (k.as_str(), *ts))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
