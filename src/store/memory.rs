//! In-memory store.
//!
//! Mirrors browser `localStorage`: values are held as JSON and an optional
//! byte quota, counted over keys plus serialized values, makes oversized
//! writes fail with `StoreError::QuotaExceeded`.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{RestoreGate, Store};

/// Thread-safe map-backed [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
    quota_bytes: Option<usize>,
    gate: RestoreGate,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once the total footprint would exceed
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Seed a store with initial values. Seeding bypasses the quota and
    /// `null` values are dropped.
    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let entries = entries
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.into(), v))
            .collect();
        Self {
            entries: RwLock::new(entries),
            ..Self::default()
        }
    }

    /// Copy of every entry currently held.
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current footprint in bytes, as counted against the quota.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(key, value)| entry_footprint(key, value))
            .sum()
    }
}

fn entry_footprint(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        if value.is_null() {
            return self.remove(key);
        }

        let mut entries = self.entries.write();

        if let Some(limit) = self.quota_bytes {
            let current: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(existing, v)| entry_footprint(existing, v))
                .sum();
            let needed = current + entry_footprint(key, value);

            if needed > limit {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                    needed_bytes: needed,
                    limit_bytes: limit,
                });
            }
        }

        entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn restore_gate(&self) -> &RestoreGate {
        &self.gate
    }
}
