//! Error types for Keepsake.
//!
//! Every failure category is a distinct, named variant so callers can tell
//! "not JSON at all" from "JSON but wrong shape" from "right shape but wrong
//! version" without parsing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for Keepsake operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Key registry construction and lookup errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown key: {internal_id}")]
    UnknownKey { internal_id: String },

    #[error("Unknown backup field: {external_field}")]
    UnknownField { external_field: String },

    #[error("Key registered twice: {internal_id}")]
    DuplicateKey { internal_id: String },

    #[error("Backup field registered twice: {external_field}")]
    DuplicateField { external_field: String },
}

/// Errors raised by a [`Store`](crate::store::Store) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage quota exceeded writing '{key}': {needed_bytes} bytes needed, {limit_bytes} allowed")]
    QuotaExceeded {
        key: String,
        needed_bytes: usize,
        limit_bytes: usize,
    },

    #[error("Store I/O failed: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored value for '{key}' is corrupt: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A value could not be turned into JSON during export.
#[derive(Error, Debug)]
#[error("Value for '{key}' is not serializable: {source}")]
pub struct SerializationError {
    pub key: String,
    #[source]
    pub source: serde_json::Error,
}

/// Errors produced while building a backup blob.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error("Failed to read '{key}' from the store: {source}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },
}

/// Errors produced while validating a backup blob.
///
/// Variants are listed in the order the checks run.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Backup is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    #[error("Backup is not valid JSON: {source}")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },

    #[error("Backup is missing its 'meta' section or schema version")]
    MissingMeta,

    #[error("Unsupported backup schema version: {found}")]
    UnsupportedSchema { found: serde_json::Value },

    #[error("Backup is missing its entries container")]
    MissingEntries,

    #[error("Backup contains an unregistered field: {field}")]
    UnknownField { field: String },

    #[error("Failed to read backup file: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors produced by a restore.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Backup rejected: {0}")]
    Decode(#[from] DecodeError),

    #[error("Restore partially completed: writing '{failed_key}' failed after {} key(s) were applied: {source}", .applied_keys.len())]
    PartialWriteFailure {
        failed_key: String,
        applied_keys: Vec<String>,
        #[source]
        source: StoreError,
    },

    #[error("Another restore is already in progress")]
    RestoreInProgress,
}

/// Errors raised by the on-disk backup archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to read backup: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write backup: {path}: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory creation failed: {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

impl DecodeError {
    /// Stable machine-readable code for this rejection.
    pub fn error_code(&self) -> &'static str {
        match self {
            DecodeError::TooLarge { .. } => "TOO_LARGE",
            DecodeError::Malformed { .. } => "MALFORMED",
            DecodeError::MissingMeta => "MISSING_META",
            DecodeError::UnsupportedSchema { .. } => "UNSUPPORTED_SCHEMA",
            DecodeError::MissingEntries => "MISSING_ENTRIES",
            DecodeError::UnknownField { .. } => "UNKNOWN_FIELD",
            DecodeError::Io { .. } => "IO_ERROR",
        }
    }
}

impl RestoreError {
    /// Stable machine-readable code for this failure.
    pub fn error_code(&self) -> &'static str {
        match self {
            RestoreError::Decode(inner) => inner.error_code(),
            RestoreError::PartialWriteFailure { .. } => "PARTIAL_WRITE_FAILURE",
            RestoreError::RestoreInProgress => "RESTORE_IN_PROGRESS",
        }
    }

    /// Returns true if the store is known to be untouched, so the caller may
    /// offer a plain retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RestoreError::Decode(_) | RestoreError::RestoreInProgress => true,
            RestoreError::PartialWriteFailure { .. } => false,
        }
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            RestoreError::Decode(DecodeError::Malformed { .. }) => {
                Some("The selected file is not a backup. Choose a backup file exported by this app.")
            }
            RestoreError::Decode(DecodeError::UnsupportedSchema { .. }) => {
                Some("This backup was made by an incompatible version of the app.")
            }
            RestoreError::Decode(DecodeError::TooLarge { .. }) => {
                Some("The selected file is too large to be a backup.")
            }
            RestoreError::Decode(_) => Some("The backup file is incomplete. Try a different file."),
            RestoreError::PartialWriteFailure { .. } => Some(
                "Restore partially completed. Please re-export and inspect your data before retrying.",
            ),
            RestoreError::RestoreInProgress => Some("Wait for the current restore to finish."),
        }
    }
}
