//! Snapshot Schema
//!
//! The in-memory form of a validated backup, plus the wire layout the codec
//! writes.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Schema version written into every new backup. The only version accepted
/// on restore.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Top-level field holding the metadata section.
pub const META_FIELD: &str = "meta";

/// Metadata field holding the schema version.
pub const SCHEMA_FIELD: &str = "schema";

/// Metadata field holding the export timestamp.
pub const EXPORTED_AT_FIELD: &str = "exportedAt";

/// Top-level field holding the backed-up entries.
pub const ENTRIES_FIELD: &str = "localStorage";

/// Backup metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    pub schema_version: u32,

    /// When the backup was taken. `None` if the blob omitted it or carried a
    /// timestamp that does not parse.
    pub exported_at: Option<DateTime<Utc>>,
}

/// A validated backup, keyed by internal store key.
///
/// A `Value::Null` entry means the key was absent when the backup was taken.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub meta: SnapshotMeta,
    pub entries: BTreeMap<String, Value>,

    /// Blob fields that were not in the registry and got dropped.
    pub ignored_fields: Vec<String>,
}

impl Snapshot {
    pub fn get(&self, internal_id: &str) -> Option<&Value> {
        self.entries.get(internal_id)
    }

    pub fn contains(&self, internal_id: &str) -> bool {
        self.entries.contains_key(internal_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct WireMeta {
    pub schema: u32,
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct WireBackup {
    pub meta: WireMeta,
    #[serde(rename = "localStorage")]
    pub entries: serde_json::Map<String, Value>,
}
