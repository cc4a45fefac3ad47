//! Durable local storage for the store collections.
//!
//! # Layout
//!
//! Each collection (`products`, `cart`, `favorites`) is stored under its own
//! key as a pretty-printed JSON list, so the files stay human-inspectable:
//!
//! ```text
//! .kaline/
//! ├── products.json
//! ├── cart.json
//! └── favorites.json
//! ```
//!
//! Records tolerate field additions in both directions: unknown fields are
//! ignored and missing optional fields take their defaults.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use kaline_core::{Collection, ErrorKind};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::lock;

/// Default per-key quota, matching what browsers give local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Errors writing durable state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Collection could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Encoded collection is larger than the quota.
    #[error("quota exceeded for '{key}': {size} bytes (limit {quota})")]
    QuotaExceeded {
        key: String,
        size: usize,
        quota: usize,
    },

    /// Key contains characters that cannot be used as a file name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

impl StorageError {
    /// Taxonomy classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

/// A durable key/value medium.
pub trait Storage: Send + Sync {
    /// Read the raw value under `key`, `None` if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the medium cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if the medium cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a data directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous contents intact.
///
/// I/O is synchronous. Stores call it under their write lock, from async code
/// too, which keeps saves in mutation order; collections are small files.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the data directory. It is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != IoErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-memory storage for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, e.g. to simulate a corrupted blob.
    pub fn insert_raw(&self, key: &str, value: &str) {
        lock::write(&self.values).insert(key.to_string(), value.to_string());
    }

    /// Get a raw value.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<String> {
        lock::read(&self.values).get(key).cloned()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert_raw(key, value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        lock::write(&self.values).remove(key);
        Ok(())
    }
}

/// Typed load/save of whole collections over a [`Storage`].
#[derive(Clone)]
pub struct PersistentStore {
    storage: Arc<dyn Storage>,
    quota_bytes: usize,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("quota_bytes", &self.quota_bytes)
            .finish_non_exhaustive()
    }
}

impl PersistentStore {
    /// Wrap a storage medium with the default quota.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_quota(storage, DEFAULT_QUOTA_BYTES)
    }

    /// Wrap a storage medium with an explicit per-key quota.
    #[must_use]
    pub fn with_quota(storage: Arc<dyn Storage>, quota_bytes: usize) -> Self {
        Self {
            storage,
            quota_bytes,
        }
    }

    /// Load a collection.
    ///
    /// Never fails. Missing state is an empty collection. A blob that is not a
    /// JSON list is logged and treated as empty; individual records that do
    /// not decode are logged and skipped.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let key = collection.storage_key();
        let raw = match self.storage.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "no persisted state");
                return Vec::new();
            }
            Err(e) => {
                warn!(key, error = %e, "failed to read persisted state, starting empty");
                return Vec::new();
            }
        };

        let records: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(key, error = %e, "persisted state is corrupted, starting empty");
                return Vec::new();
            }
        };

        let total = records.len();
        let items: Vec<T> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable persisted record");
                    None
                }
            })
            .collect();

        debug!(key, loaded = items.len(), total, "loaded persisted state");
        items
    }

    /// Whether anything is stored under `collection`, even an empty or
    /// corrupted list. An unreadable medium counts as present.
    pub fn exists(&self, collection: Collection) -> bool {
        let key = collection.storage_key();
        match self.storage.read(key) {
            Ok(raw) => raw.is_some(),
            Err(e) => {
                warn!(key, error = %e, "failed to check persisted state");
                true
            }
        }
    }

    /// Replace a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the encoded list is over the
    /// quota, or the medium's error if the write fails. The previous contents
    /// are left in place either way.
    pub fn save<T: Serialize>(
        &self,
        collection: Collection,
        items: &[T],
    ) -> Result<(), StorageError> {
        let key = collection.storage_key();
        let encoded = serde_json::to_string_pretty(items)?;
        if encoded.len() > self.quota_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                size: encoded.len(),
                quota: self.quota_bytes,
            });
        }
        self.storage.write(key, &encoded)?;
        debug!(key, items = items.len(), bytes = encoded.len(), "saved collection");
        Ok(())
    }

    /// Delete a collection.
    ///
    /// # Errors
    ///
    /// Returns the medium's error if the delete fails.
    pub fn clear(&self, collection: Collection) -> Result<(), StorageError> {
        self.storage.remove(collection.storage_key())
    }
}
