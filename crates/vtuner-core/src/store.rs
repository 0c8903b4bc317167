//! Persistent key/value store shared by every worker in a cycle.
//!
//! Values are JSON documents keyed by dotted strings (`epg.blocks.last_update`).
//! The map is guarded by a `parking_lot::RwLock`, so concurrent access from
//! all workers and the startup task is safe without the supervisor's help.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, TunerError};

/// Thread-safe JSON document store, optionally backed by a file.
#[derive(Debug)]
pub struct Store {
    entries: RwLock<BTreeMap<String, Value>>,
    path: Option<PathBuf>,
}

impl Store {
    /// Creates an empty store that is never written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            path: None,
        }
    }

    /// Opens a store backed by `path`, loading it if the file exists.
    ///
    /// `None` yields an in-memory store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::in_memory());
        };

        let entries: BTreeMap<String, Value> = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                TunerError::store(format!("failed to read {}: {e}", path.display()))
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    TunerError::store(format!("failed to parse {}: {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened store");

        Ok(Self {
            entries: RwLock::new(entries),
            path: Some(path.to_path_buf()),
        })
    }

    /// Returns the backing file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads and deserializes a value.
    ///
    /// Returns `Ok(None)` if the key is absent.
    ///
    /// # Errors
    /// Returns an error if the stored value has a different shape than `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores a value, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.entries.write().insert(key.into(), value);
        Ok(())
    }

    /// Atomically rewrites a numeric counter and returns the new value.
    pub fn increment(&self, key: &str) -> u64 {
        let mut entries = self.entries.write();
        let next = entries.get(key).and_then(Value::as_u64).unwrap_or(0) + 1;
        entries.insert(key.to_string(), Value::from(next));
        next
    }

    /// Removes a key, returning true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Returns all keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Writes the store to its backing file.
    ///
    /// Writes to a sibling temp file first and renames it over the target.
    /// A no-op for in-memory stores.
    ///
    /// # Errors
    /// Returns an error if serialization or any file operation fails.
    pub fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let body = {
            let entries = self.entries.read();
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(path = %path.display(), "flushed store");
        Ok(())
    }
}
