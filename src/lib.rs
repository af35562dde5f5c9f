//! Keepsake - Versioned State Snapshots
//!
//! Keepsake backs up and restores application state kept under named keys in
//! a key-value store, using a self-describing JSON blob:
//!
//! ```text
//! {
//!   "meta": { "schema": 1, "exportedAt": "2023-01-01T00:00:00.000Z" },
//!   "localStorage": { "savedSoccerGames": { ... }, ... }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`KeyRegistry`]: which keys take part in a backup, and their blob names
//! - [`SnapshotCodec`]: encodes store values and validates incoming blobs
//! - [`RestoreCoordinator`]: exports from and restores into a live [`Store`],
//!   never writing anything when a blob fails validation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use keepsake::{KeyRegistry, MemoryStore, RestoreCoordinator, SnapshotConfig, Store};
//! use serde_json::json;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.set("last-home-team-name", &json!("FC Example")).unwrap();
//!
//! let coordinator = RestoreCoordinator::new(
//!     store.clone(),
//!     Arc::new(KeyRegistry::matchday()),
//!     SnapshotConfig::default(),
//! );
//! let blob = coordinator.create_backup().unwrap();
//!
//! store.set("last-home-team-name", &json!("Someone Else")).unwrap();
//! coordinator.restore_from_backup(&blob).unwrap();
//!
//! assert_eq!(store.get("last-home-team-name").unwrap(), Some(json!("FC Example")));
//! ```

pub mod archive;
pub mod clock;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use archive::BackupArchive;
pub use clock::{Clock, FixedClock, SystemClock};
pub use codec::SnapshotCodec;
pub use config::{MissingEntryPolicy, SnapshotConfig, UnknownFieldPolicy};
pub use coordinator::{RestoreCoordinator, RestorePhase, RestoreSummary};
pub use error::{
    ArchiveError, DecodeError, ExportError, RegistryError, RestoreError, Result,
    SerializationError, SnapshotError, StoreError,
};
pub use registry::{KeyDescriptor, KeyRegistry};
pub use snapshot::{Snapshot, SnapshotMeta, CURRENT_SCHEMA_VERSION, ENTRIES_FIELD};
pub use store::{JsonFileStore, MemoryStore, RestoreGate, Store};
