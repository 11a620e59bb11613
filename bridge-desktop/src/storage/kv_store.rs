//! Synchronous string key-value stores.
//!
//! The native primitive wrapped by [`SyncBackedStorage`](super::SyncBackedStorage):
//! flat, string keys to string values, every call completes before returning.
//! Errors carry a host-exception shape (`name`, optional numeric `code`,
//! `message`) so quota detection can introspect them.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error raised by a [`SyncKeyValueStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct KeyValueStoreError {
    pub name: String,
    pub code: Option<i32>,
    pub message: String,
}

impl KeyValueStoreError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new("QuotaExceededError", message).with_code(22)
    }
}

impl From<io::Error> for KeyValueStoreError {
    fn from(err: io::Error) -> Self {
        let name = match err.kind() {
            io::ErrorKind::PermissionDenied => "PermissionDenied",
            io::ErrorKind::NotFound => "NotFound",
            io::ErrorKind::InvalidData => "InvalidData",
            _ => "IoError",
        };
        Self {
            name: name.to_string(),
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }
}

pub type KvResult<T> = std::result::Result<T, KeyValueStoreError>;

/// Synchronous, string-only, flat key-value store.
#[cfg_attr(test, mockall::automock)]
pub trait SyncKeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> KvResult<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> KvResult<()>;

    fn remove_item(&self, key: &str) -> KvResult<()>;

    /// Key at `index` in the store's iteration order.
    fn key(&self, index: usize) -> Option<String>;

    fn length(&self) -> usize;

    fn clear(&self) -> KvResult<()>;

    /// Snapshot of every key.
    fn all_keys(&self) -> Vec<String> {
        (0..self.length()).filter_map(|i| self.key(i)).collect()
    }

    /// Do mutations touch the disk? Async wrappers move those calls off the
    /// runtime's worker threads.
    fn blocks_on_io(&self) -> bool {
        false
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

fn usage(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| entry_size(k, v)).sum()
}

/// Would writing `key = value` keep `entries` within `quota`?
fn check_quota(
    entries: &BTreeMap<String, String>,
    quota: Option<usize>,
    key: &str,
    value: &str,
) -> KvResult<()> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let current = usage(entries);
    let replaced = entries.get(key).map(|old| entry_size(key, old)).unwrap_or(0);
    let projected = current - replaced + entry_size(key, value);
    if projected > quota {
        return Err(KeyValueStoreError::quota_exceeded(format!(
            "writing {} would use {} of {} bytes",
            key, projected, quota
        )));
    }
    Ok(())
}

// ============================================================================
// In-memory store
// ============================================================================

/// Volatile store with an optional byte quota.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        usage(&self.entries.lock())
    }
}

impl SyncKeyValueStore for InMemoryKeyValueStore {
    fn get_item(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> KvResult<()> {
        let mut entries = self.entries.lock();
        check_quota(&entries, self.quota_bytes, key, value)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> KvResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.lock().keys().nth(index).cloned()
    }

    fn length(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) -> KvResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    fn all_keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Durable store persisted as one JSON object file, rewritten on every
/// mutation.
///
/// Reads are served from memory. Every mutation writes the whole file and
/// renames it into place, so it reports [`SyncKeyValueStore::blocks_on_io`].
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl FileKeyValueStore {
    /// Load `path` (or start empty when it does not exist yet).
    pub fn open(path: impl Into<PathBuf>, quota_bytes: Option<usize>) -> KvResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                KeyValueStoreError::new(
                    "InvalidStateError",
                    format!("{} is not a key-value file: {}", path.display(), e),
                )
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = entries.len(), "Opened key-value file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            quota_bytes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> KvResult<()> {
        let json = serde_json::to_vec(entries)
            .map_err(|e| KeyValueStoreError::new("EncodingError", e.to_string()))?;
        let staging = self.path.with_extension("tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Failed to replace key-value file");
            KeyValueStoreError::from(e)
        })?;
        debug!(path = %self.path.display(), entries = entries.len(), "Persisted key-value file");
        Ok(())
    }

    /// Apply `mutate` to a copy and commit only when persisting succeeds.
    fn mutate<F>(&self, mutate: F) -> KvResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> KvResult<()>,
    {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        mutate(&mut next)?;
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl SyncKeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> KvResult<()> {
        let quota = self.quota_bytes;
        self.mutate(|entries| {
            check_quota(entries, quota, key, value)?;
            entries.insert(key.to_string(), value.to_string());
            Ok(())
        })
    }

    fn remove_item(&self, key: &str) -> KvResult<()> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.mutate(|entries| {
            entries.remove(key);
            Ok(())
        })
    }

    fn key(&self, index: usize) -> Option<String> {
        self.entries.lock().keys().nth(index).cloned()
    }

    fn length(&self) -> usize {
        self.entries.lock().len()
    }

    fn clear(&self) -> KvResult<()> {
        self.mutate(|entries| {
            entries.clear();
            Ok(())
        })
    }

    fn all_keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    fn blocks_on_io(&self) -> bool {
        true
    }
}
