//! Snapshot configuration.
//!
//! The policies here cover the cases a backup file can legitimately be
//! ambiguous about: fields this build does not know, and registered keys the
//! backup does not mention.

use serde::{Deserialize, Serialize};

/// Default ceiling for an accepted backup blob (16 MiB).
pub const DEFAULT_MAX_BLOB_BYTES: usize = 16 * 1024 * 1024;

/// What to do with a blob field that is not in the key registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    /// Drop the field and carry on (forward compatible).
    #[default]
    Ignore,

    /// Reject the whole backup.
    Reject,
}

/// What to do with a registered key that a backup does not contain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingEntryPolicy {
    /// Keep whatever the store currently holds.
    #[default]
    LeaveUntouched,

    /// Remove the key from the store.
    Clear,
}

/// Tunables shared by the codec and the restore coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotConfig {
    pub unknown_fields: UnknownFieldPolicy,
    pub missing_entries: MissingEntryPolicy,
    pub max_blob_bytes: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Ignore,
            missing_entries: MissingEntryPolicy::LeaveUntouched,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

impl SnapshotConfig {
    /// Reject unknown fields instead of ignoring them.
    pub fn strict() -> Self {
        Self::default().with_unknown_fields(UnknownFieldPolicy::Reject)
    }

    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    pub fn with_missing_entries(mut self, policy: MissingEntryPolicy) -> Self {
        self.missing_entries = policy;
        self
    }

    pub fn with_max_blob_bytes(mut self, max: usize) -> Self {
        self.max_blob_bytes = max;
        self
    }
}
