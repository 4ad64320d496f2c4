//! Persistent Store Module
//!
//! The persistence seam the cache layer writes through, plus the two adapters
//! shipped with the crate: an in-memory map and a one-file-per-key directory.

use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{CacheError, Result};

// == Persistent Store Trait ==
/// Async key-value persistence for opaque payloads.
///
/// Every call may fail. The cache layer treats failures as non-fatal: a
/// failed read is a miss and a failed write leaves the value uncached.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// A name for tracing.
    fn name(&self) -> &'static str;

    /// Returns the payload stored under `key`, `None` on a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores `value` under `key`, replacing any previous payload.
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;
}

// == Memory Store ==
/// Process-local store. Does not survive restarts on its own, but one
/// instance can be shared between cache instances to simulate a reload.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored payloads, including the timestamp index.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// == File Store ==
/// Suffix of committed payload files.
const ENTRY_SUFFIX: &str = ".entry";

/// Suffix of in-flight writes. Anything left with it is garbage.
const TMP_SUFFIX: &str = ".tmp";

/// Escaped names longer than this are shortened to a prefix plus a digest.
const MAX_ESCAPED_NAME: usize = 120;

/// Escaped characters kept in front of the digest of a shortened name.
const HASHED_NAME_PREFIX: usize = 64;

/// Stores each key as one file under a directory.
///
/// Keys are escaped into file names, so any string is a valid key. Long keys
/// are shortened with a SHA-256 digest to stay under file-name limits. Each
/// write goes through its own temporary file and a rename, so a crash never
/// leaves a torn payload and concurrent writers of one key never collide.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the store directory.
    ///
    /// Temporary files left by interrupted writes are removed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::store(&format!("create {}", dir.display()), e))?;

        let swept = sweep_temp_files(&dir).await?;
        if swept > 0 {
            warn!(dir = %dir.display(), swept, "Removed leftover temporary files");
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(entry_file_name(key))
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::store(&format!("read '{}'", key), e)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.entry_path(key);
        let context = format!("write '{}'", key);

        // Unpersisted temp files delete themselves on drop
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix("write-")
                .suffix(TMP_SUFFIX)
                .tempfile_in(&dir)?;
            tmp.write_all(&value)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| CacheError::store(&context, e))?
        .map_err(|e| CacheError::store(&context, e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::store(&format!("remove '{}'", key), e)),
        }
    }
}

/// Maps a key to a file-name-safe string. `[A-Za-z0-9_-]` pass through,
/// every other byte becomes `%XX`.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'-' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// File name for `key`. Short names are the escaped key; long ones keep an
/// escaped prefix and append the key's digest after a `~`, which escaping
/// never produces.
fn entry_file_name(key: &str) -> String {
    let escaped = escape_key(key);
    if escaped.len() <= MAX_ESCAPED_NAME {
        return format!("{}{}", escaped, ENTRY_SUFFIX);
    }

    let digest = Sha256::digest(key.as_bytes());
    format!(
        "{}~{:x}{}",
        &escaped[..HASHED_NAME_PREFIX],
        digest,
        ENTRY_SUFFIX
    )
}

/// Deletes `*.tmp` files directly under `dir`. Returns how many went.
async fn sweep_temp_files(dir: &Path) -> Result<usize> {
    let context = format!("scan {}", dir.display());
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CacheError::store(&context, e))?;

    let mut swept = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::store(&context, e))?
    {
        if !entry.file_name().to_string_lossy().ends_with(TMP_SUFFIX) {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => swept += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %entry.path().display(), "Failed to remove temporary file: {}", e),
        }
    }
    Ok(swept)
}
