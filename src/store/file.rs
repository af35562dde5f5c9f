//! File-backed store.
//!
//! Keeps every entry in one JSON object on disk. Each write persists the
//! whole map to a temporary sibling file and renames it into place, so the
//! file on disk is always either the old map or the new one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::{RestoreGate, Store};

/// Suffix of the temporary file used for atomic replacement.
const TEMP_SUFFIX: &str = ".tmp";

/// A [`Store`] persisted as a single JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
    gate: RestoreGate,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the file cannot be read and
    /// `StoreError::Corrupt` if it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?;
            let mut entries = serde_json::from_str::<BTreeMap<String, Value>>(&content)
                .map_err(|e| StoreError::Corrupt {
                    key: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            entries.retain(|_, v| !v.is_null());
            entries
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), entries = entries.len(), "opened file store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            gate: RestoreGate::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of every entry currently held.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries.lock().clone()
    }

    fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| StoreError::Backend(format!("failed to serialize store: {}", e)))?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, content).map_err(|e| StoreError::Io {
            path: temp_path.clone(),
            source: e,
        })?;
        fs::rename(&temp_path, &self.path).map_err(|e| StoreError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Apply `change` to a copy of the map and keep it only if it persists.
    fn update(&self, change: impl FnOnce(&mut BTreeMap<String, Value>)) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        if value.is_null() {
            return self.remove(key);
        }
        self.update(|entries| {
            entries.insert(key.to_string(), value.clone());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if !self.entries.lock().contains_key(key) {
            return Ok(());
        }
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn restore_gate(&self) -> &RestoreGate {
        &self.gate
    }
}
