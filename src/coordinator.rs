//! Restore Coordinator
//!
//! Runs export and restore against one live [`Store`]. A restore validates
//! the whole blob before the first write, so a rejected backup leaves the
//! store exactly as it was.
//!
//! Restores against the same store never interleave, even through different
//! coordinators: `restore` holds the exclusive side of the store's
//! [`RestoreGate`](crate::store::RestoreGate) and `export` the shared side,
//! so an export never observes a half-applied restore.
//!
//! ```text
//! Idle -> Validating -> Rejected
//!                    -> Applying -> Applied
//!                                -> PartiallyApplied
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::archive::BackupArchive;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::codec::SnapshotCodec;
use crate::config::{MissingEntryPolicy, SnapshotConfig};
use crate::error::{DecodeError, ExportError, RestoreError, StoreError};
use crate::registry::KeyRegistry;
use crate::snapshot::Snapshot;
use crate::store::Store;

/// Where the most recent restore got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePhase {
    /// No restore has run yet.
    Idle,
    /// Blob is being decoded; the store has not been touched.
    Validating,
    /// Blob failed validation; the store was not touched.
    Rejected,
    /// Entries are being written.
    Applying,
    /// Every entry was written.
    Applied,
    /// A write failed after zero or more keys were applied.
    PartiallyApplied,
}

impl RestorePhase {
    /// True for phases a restore ends in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RestorePhase::Rejected | RestorePhase::Applied | RestorePhase::PartiallyApplied
        )
    }
}

impl std::fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestorePhase::Idle => write!(f, "Idle"),
            RestorePhase::Validating => write!(f, "Validating"),
            RestorePhase::Rejected => write!(f, "Rejected"),
            RestorePhase::Applying => write!(f, "Applying"),
            RestorePhase::Applied => write!(f, "Applied"),
            RestorePhase::PartiallyApplied => write!(f, "Partially Applied"),
        }
    }
}

/// Outcome of a successful restore.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreSummary {
    /// Keys written with a value from the backup.
    pub restored_keys: Vec<String>,

    /// Keys removed because the backup held `null` for them, or because the
    /// backup omitted them under [`MissingEntryPolicy::Clear`].
    pub cleared_keys: Vec<String>,

    /// Registered keys the backup omitted and that were left untouched.
    pub skipped_keys: Vec<String>,

    /// Backup fields dropped because the registry does not know them.
    pub ignored_fields: Vec<String>,

    /// When the restored backup was taken, if it said.
    pub exported_at: Option<DateTime<Utc>>,
}

impl RestoreSummary {
    /// Number of keys the restore wrote or removed.
    pub fn applied_count(&self) -> usize {
        self.restored_keys.len() + self.cleared_keys.len()
    }
}

#[derive(Clone, Copy)]
enum EntryWrite<'a> {
    Set(&'a Value),
    Remove,
}

/// Exports and restores snapshots of one store.
pub struct RestoreCoordinator<S: Store> {
    store: S,
    codec: SnapshotCodec,
    clock: Box<dyn Clock + Send + Sync>,
    phase: Mutex<RestorePhase>,
}

impl<S: Store> RestoreCoordinator<S> {
    /// Create a coordinator using the system clock.
    pub fn new(store: S, registry: Arc<KeyRegistry>, config: SnapshotConfig) -> Self {
        Self::with_clock(store, registry, config, SystemClock)
    }

    /// Create a coordinator stamping exports with `clock`.
    pub fn with_clock(
        store: S,
        registry: Arc<KeyRegistry>,
        config: SnapshotConfig,
        clock: impl Clock + Send + Sync + 'static,
    ) -> Self {
        Self {
            store,
            codec: SnapshotCodec::new(registry, config),
            clock: Box::new(clock),
            phase: Mutex::new(RestorePhase::Idle),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn codec(&self) -> &SnapshotCodec {
        &self.codec
    }

    /// Phase reached by the most recent restore.
    pub fn phase(&self) -> RestorePhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: RestorePhase) {
        debug!(%phase, "restore phase");
        *self.phase.lock() = phase;
    }

    /// Read every registered key and encode it as a backup blob.
    ///
    /// Keys absent from the store are written as `null`.
    pub fn export(&self) -> Result<String, ExportError> {
        self.export_with(self.clock.as_ref())
    }

    fn export_with<C: Clock + ?Sized>(&self, clock: &C) -> Result<String, ExportError> {
        let _shared = self.store.restore_gate().read();

        let registry = self.codec.registry();
        let mut values: BTreeMap<String, Option<Value>> = BTreeMap::new();

        for descriptor in registry.list_keys() {
            let value = self
                .store
                .get(&descriptor.internal_id)
                .map_err(|source| ExportError::Store {
                    key: descriptor.internal_id.clone(),
                    source,
                })?;
            values.insert(descriptor.internal_id.clone(), value);
        }

        let blob = self.codec.encode(&values, clock)?;
        info!(keys = values.len(), bytes = blob.len(), "exported backup");
        Ok(blob)
    }

    /// Validate `blob` and apply it to the store.
    ///
    /// Waits for any in-flight restore on the same store to finish first.
    ///
    /// # Errors
    /// `RestoreError::Decode` if the blob is rejected, with the store
    /// untouched. `RestoreError::PartialWriteFailure` if a store write fails
    /// part way; keys applied before the failure are not rolled back.
    pub fn restore(&self, blob: impl AsRef<[u8]>) -> Result<RestoreSummary, RestoreError> {
        let _exclusive = self.store.restore_gate().write();
        self.restore_locked(blob.as_ref())
    }

    /// Like [`restore`](Self::restore), but fails fast with
    /// `RestoreError::RestoreInProgress` instead of waiting.
    pub fn try_restore(&self, blob: impl AsRef<[u8]>) -> Result<RestoreSummary, RestoreError> {
        let Some(_exclusive) = self.store.restore_gate().try_write() else {
            warn!("restore rejected: another restore or export is running");
            return Err(RestoreError::RestoreInProgress);
        };
        self.restore_locked(blob.as_ref())
    }

    /// Read a backup file through `archive` and restore it.
    ///
    /// The file size is checked against the ceiling before it is read. A
    /// file that cannot be read counts as a rejected backup.
    pub fn restore_from_file(
        &self,
        archive: &BackupArchive,
        path: &Path,
    ) -> Result<RestoreSummary, RestoreError> {
        let _exclusive = self.store.restore_gate().write();
        self.set_phase(RestorePhase::Validating);

        let blob = match archive.read_blob(path, self.codec.config().max_blob_bytes as u64) {
            Ok(blob) => blob,
            Err(err) => return Err(self.reject(err)),
        };
        self.restore_locked(&blob)
    }

    /// Export the current state straight into `archive`.
    ///
    /// The backup filename and its `exportedAt` carry the same instant.
    pub fn backup_to_archive(&self, archive: &BackupArchive) -> crate::Result<PathBuf> {
        let now = self.clock.now();
        let blob = self.export_with(&FixedClock(now))?;
        Ok(archive.write(&blob, now)?)
    }

    /// Produce a backup blob of the current state.
    pub fn create_backup(&self) -> Result<String, ExportError> {
        self.export()
    }

    /// Restore state from a backup blob supplied by the user.
    pub fn restore_from_backup(&self, blob: impl AsRef<[u8]>) -> Result<RestoreSummary, RestoreError> {
        self.restore(blob)
    }

    fn restore_locked(&self, blob: &[u8]) -> Result<RestoreSummary, RestoreError> {
        self.set_phase(RestorePhase::Validating);

        let snapshot = match self.codec.decode(blob) {
            Ok(snapshot) => snapshot,
            Err(err) => return Err(self.reject(err)),
        };

        self.set_phase(RestorePhase::Applying);

        match self.apply(&snapshot) {
            Ok(summary) => {
                self.set_phase(RestorePhase::Applied);
                info!(
                    restored = summary.restored_keys.len(),
                    cleared = summary.cleared_keys.len(),
                    skipped = summary.skipped_keys.len(),
                    "restore applied"
                );
                Ok(summary)
            }
            Err(err) => {
                self.set_phase(RestorePhase::PartiallyApplied);
                warn!("restore partially applied: {}", err);
                Err(err)
            }
        }
    }

    fn reject(&self, err: DecodeError) -> RestoreError {
        warn!(code = err.error_code(), "backup rejected: {}", err);
        self.set_phase(RestorePhase::Rejected);
        err.into()
    }

    fn apply(&self, snapshot: &Snapshot) -> Result<RestoreSummary, RestoreError> {
        let missing_policy = self.codec.config().missing_entries;
        let mut summary = RestoreSummary {
            ignored_fields: snapshot.ignored_fields.clone(),
            exported_at: snapshot.meta.exported_at,
            ..RestoreSummary::default()
        };
        let mut applied_keys: Vec<String> = Vec::new();

        for descriptor in self.codec.registry().list_keys() {
            let key = descriptor.internal_id.as_str();

            let write = match snapshot.get(key) {
                Some(Value::Null) => EntryWrite::Remove,
                Some(value) => EntryWrite::Set(value),
                None => match missing_policy {
                    MissingEntryPolicy::LeaveUntouched => {
                        summary.skipped_keys.push(key.to_string());
                        continue;
                    }
                    MissingEntryPolicy::Clear => EntryWrite::Remove,
                },
            };

            let result: Result<(), StoreError> = match write {
                EntryWrite::Set(value) => self.store.set(key, value),
                EntryWrite::Remove => self.store.remove(key),
            };

            if let Err(source) = result {
                return Err(RestoreError::PartialWriteFailure {
                    failed_key: key.to_string(),
                    applied_keys,
                    source,
                });
            }

            match write {
                EntryWrite::Set(_) => summary.restored_keys.push(key.to_string()),
                EntryWrite::Remove => summary.cleared_keys.push(key.to_string()),
            }
            applied_keys.push(key.to_string());
        }

        Ok(summary)
    }
}

impl<S: Store> std::fmt::Debug for RestoreCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestoreCoordinator")
            .field("codec", &self.codec)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
