//! Adaptive Cache Layer
//!
//! Owns the timestamp index, the TTL table and the store handle, and keeps
//! the index and the store in agreement: a key has a timestamp exactly when
//! its payload is in the store.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{
    policy, CacheReport, CacheStats, Clock, EntryReport, PersistentStore, SystemClock,
    TimestampIndex, TtlPolicy, INDEX_KEY, MAX_KEY_LENGTH,
};
use crate::error::{CacheError, Result};
use crate::tasks::RevalidationScheduler;

/// Namespace prefixed to every storage key unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "cache_";

/// How long network-first waits before serving what it has.
pub const DEFAULT_NETWORK_TIMEOUT: Duration = Duration::from_secs(5);

// == Options ==
/// Construction-time settings for an [`AdaptiveCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Prefix for every storage key
    pub namespace: String,
    /// Resource type -> TTL table
    pub policy: TtlPolicy,
    /// Default network-first deadline
    pub network_timeout: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            policy: TtlPolicy::default(),
            network_timeout: DEFAULT_NETWORK_TIMEOUT,
        }
    }
}

// == Adaptive Cache ==
/// Handle to one cache instance. Cloning is cheap and shares all state.
#[derive(Clone)]
pub struct AdaptiveCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn PersistentStore>,
    index: RwLock<TimestampIndex>,
    /// Serializes index mutation + persistence so an older snapshot never
    /// overwrites a newer one.
    index_writes: tokio::sync::Mutex<()>,
    policy: TtlPolicy,
    namespace: String,
    network_timeout: Duration,
    clock: Arc<dyn Clock>,
    stats: Mutex<CacheStats>,
    scheduler: RevalidationScheduler,
}

impl AdaptiveCache {
    // == Constructor ==
    /// Creates a cache over `store`. Call [`init`](Self::init) before use to
    /// load the persisted timestamp index.
    pub fn new(store: Arc<dyn PersistentStore>, options: CacheOptions) -> Self {
        Self::with_clock(store, options, Arc::new(SystemClock))
    }

    /// Same as [`new`](Self::new) with an explicit time source.
    pub fn with_clock(
        store: Arc<dyn PersistentStore>,
        options: CacheOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                index: RwLock::new(TimestampIndex::new()),
                index_writes: tokio::sync::Mutex::new(()),
                policy: options.policy,
                namespace: options.namespace,
                network_timeout: options.network_timeout,
                clock,
                stats: Mutex::new(CacheStats::new()),
                scheduler: RevalidationScheduler::new(),
            }),
        }
    }

    // == Init ==
    /// Reloads the timestamp index from the store.
    ///
    /// Best effort: an unreadable or corrupt index starts the cache empty
    /// rather than failing. Returns the number of keys loaded.
    pub async fn init(&self) -> usize {
        let index_key = self.index_key();
        let loaded = match self.inner.store.get(&index_key).await {
            Ok(Some(bytes)) => match TimestampIndex::decode(&bytes) {
                Ok(index) => index,
                Err(e) => {
                    warn!(error = %e, "Persisted timestamp index is corrupt, starting empty");
                    TimestampIndex::new()
                }
            },
            Ok(None) => TimestampIndex::new(),
            Err(e) => {
                warn!(error = %e, "Could not read timestamp index, starting empty");
                self.record(CacheStats::record_store_error);
                TimestampIndex::new()
            }
        };

        let _guard = self.inner.index_writes.lock().await;
        let count = loaded.len();
        *self.write_index() = loaded;
        info!(
            store = self.inner.store.name(),
            namespace = %self.inner.namespace,
            entries = count,
            "Cache initialized"
        );
        count
    }

    // == Accessors ==
    pub fn policy(&self) -> &TtlPolicy {
        &self.inner.policy
    }

    pub fn network_timeout(&self) -> Duration {
        self.inner.network_timeout
    }

    pub fn scheduler(&self) -> &RevalidationScheduler {
        &self.inner.scheduler
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Storage key holding the persisted timestamp index.
    pub fn index_key(&self) -> String {
        format!("{}{}", self.inner.namespace, INDEX_KEY)
    }

    /// Storage key for a caller key.
    pub fn entry_key(&self, key: &str) -> String {
        format!("{}{}", self.inner.namespace, key)
    }

    // == Validity ==
    /// Whether `key` was written within the TTL of `resource_type`.
    pub fn is_valid(&self, key: &str, resource_type: &str) -> bool {
        let stored_at = self.read_index().get(key);
        policy::is_valid(
            stored_at,
            self.inner.policy.ttl_for(resource_type),
            self.now_ms(),
        )
    }

    /// When `key` was last written, if it is tracked.
    pub fn stored_at(&self, key: &str) -> Option<u64> {
        self.read_index().get(key)
    }

    // == Raw Access ==
    /// Reads the stored value for `key` without any network involvement.
    pub async fn get_cache<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        validate_key(key).ok()?;
        self.read_stored(key).await
    }

    /// Writes `value` directly, as if it had just been fetched.
    ///
    /// A store failure is logged and swallowed; only an invalid key or an
    /// unserializable value is reported.
    pub async fn precache<T: Serialize>(
        &self,
        key: &str,
        resource_type: &str,
        value: &T,
    ) -> Result<()> {
        validate_key(key)?;
        let payload = serde_json::to_vec(value)?;
        if self.write_entry(key, payload).await {
            debug!(key = %key, resource_type = %resource_type, "Precached value");
        }
        Ok(())
    }

    // == Invalidation ==
    /// Removes one key. Removing an absent key is a no-op.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let removed = self.remove_entries(vec![key.to_string()]).await;
        debug!(key = %key, removed, "Invalidated key");
        Ok(())
    }

    /// Removes every tracked key containing `pattern` as a plain substring.
    ///
    /// Keys are enumerated from the timestamp index, never from the store.
    /// Returns the number of keys removed.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let keys = self.read_index().keys_matching(pattern);
        let removed = self.remove_entries(keys).await;
        debug!(pattern = %pattern, removed, "Invalidated keys by pattern");
        removed
    }

    /// Removes every tracked key and resets the persisted index.
    ///
    /// Returns the number of keys that were tracked.
    pub async fn clear_all(&self) -> usize {
        let _guard = self.inner.index_writes.lock().await;
        let keys = self.read_index().keys();

        for key in &keys {
            if let Err(e) = self.inner.store.remove(&self.entry_key(key)).await {
                warn!(key = %key, error = %e, "Failed to remove entry during clear");
                self.record(CacheStats::record_store_error);
            }
        }

        self.write_index().clear();
        if let Err(e) = self.inner.store.remove(&self.index_key()).await {
            warn!(error = %e, "Failed to remove persisted timestamp index");
            self.record(CacheStats::record_store_error);
        }
        self.record(|s| s.set_total_entries(0));

        info!(removed = keys.len(), "Cache cleared");
        keys.len()
    }

    // == Introspection ==
    /// Lists every tracked key with its age. Validity is judged against the
    /// default TTL because resource types are not recorded per key.
    pub fn introspect(&self) -> CacheReport {
        let now = self.now_ms();
        let ttl = self.inner.policy.default_ttl();
        let index = self.read_index();
        let entries: Vec<EntryReport> = index
            .iter()
            .map(|(key, stored_at)| {
                EntryReport::new(key, stored_at, now, policy::is_valid(Some(stored_at), ttl, now))
            })
            .collect();

        CacheReport {
            total_entries: entries.len(),
            entries,
        }
    }

    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self
            .inner
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        stats.set_total_entries(self.read_index().len());
        stats
    }

    // == Shutdown ==
    /// Cancels background revalidations and waits for them to stop.
    pub async fn shutdown(&self) {
        self.inner.scheduler.shutdown().await;
    }

    // == Internal Helpers ==

    /// Reads and decodes the payload for `key`. Store failures and
    /// undecodable payloads both read as a miss.
    pub(crate) async fn read_stored<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.inner.store.get(&self.entry_key(key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Stored payload does not decode, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Store read failed, treating as miss");
                self.record(CacheStats::record_store_error);
                None
            }
        }
    }

    /// Encodes a fetched value for storage. Failure is logged; the caller
    /// still gets the value, it just is not cached.
    pub(crate) fn encode<T: Serialize>(&self, key: &str, value: &T) -> Option<Vec<u8>> {
        match serde_json::to_vec(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(key = %key, error = %e, "Fetched value does not serialize, not caching");
                None
            }
        }
    }

    /// Stores a payload and stamps it in the index. The index is only touched
    /// once the store accepted the payload. Returns whether both happened.
    pub(crate) async fn write_entry(&self, key: &str, payload: Vec<u8>) -> bool {
        if let Err(e) = self.inner.store.set(&self.entry_key(key), payload).await {
            warn!(key = %key, error = %e, "Store write failed, value served but not cached");
            self.record(CacheStats::record_store_error);
            return false;
        }

        let now = self.now_ms();
        self.update_index(|index| index.record(key, now)).await;
        true
    }

    /// Removes payloads, then forgets every key whose payload is gone. A key
    /// whose removal failed stays tracked. Returns how many tracked keys were
    /// forgotten.
    async fn remove_entries(&self, keys: Vec<String>) -> usize {
        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            match self.inner.store.remove(&self.entry_key(&key)).await {
                Ok(()) => removed.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "Store remove failed, keeping key tracked");
                    self.record(CacheStats::record_store_error);
                }
            }
        }

        if removed.is_empty() {
            return 0;
        }
        self.update_index(|index| removed.iter().filter(|k| index.remove(k)).count())
            .await
    }

    /// Applies `mutate` to the index and persists the whole index.
    async fn update_index<R>(&self, mutate: impl FnOnce(&mut TimestampIndex) -> R) -> R {
        let _guard = self.inner.index_writes.lock().await;
        let (result, snapshot, len) = {
            let mut index = self.write_index();
            let result = mutate(&mut index);
            (result, index.encode(), index.len())
        };

        match snapshot {
            Ok(bytes) => {
                if let Err(e) = self.inner.store.set(&self.index_key(), bytes).await {
                    warn!(error = %e, "Failed to persist timestamp index");
                    self.record(CacheStats::record_store_error);
                }
            }
            Err(e) => warn!(error = %e, "Failed to encode timestamp index"),
        }
        self.record(|s| s.set_total_entries(len));
        result
    }

    pub(crate) fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *stats);
    }

    fn read_index(&self) -> RwLockReadGuard<'_, TimestampIndex> {
        self.inner.index.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_index(&self) -> RwLockWriteGuard<'_, TimestampIndex> {
        self.inner.index.write().unwrap_or_else(|e| e.into_inner())
    }
}

// == Key Validation ==
/// Rejects keys the store layout cannot hold.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("Key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "Key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    if key == INDEX_KEY {
        return Err(CacheError::InvalidKey(format!(
            "'{}' is reserved for the timestamp index",
            INDEX_KEY
        )));
    }
    Ok(())
}
