//! Snapshot Codec
//!
//! Converts between a map of store values and a versioned JSON backup blob.
//! Decoding validates structure in a fixed order so that each kind of bad
//! input maps to its own [`DecodeError`] variant:
//!
//! 1. size ceiling
//! 2. JSON syntax
//! 3. `meta` section and schema version present
//! 4. schema version supported
//! 5. entries container present and an object
//! 6. entry fields known to the registry (strict mode only)

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::{SnapshotConfig, UnknownFieldPolicy};
use crate::error::{DecodeError, ExportError, SerializationError};
use crate::registry::KeyRegistry;
use crate::snapshot::{
    Snapshot, SnapshotMeta, WireBackup, WireMeta, CURRENT_SCHEMA_VERSION, ENTRIES_FIELD,
    EXPORTED_AT_FIELD, META_FIELD, SCHEMA_FIELD,
};

/// Encodes and validates backup blobs for one key registry.
#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    registry: Arc<KeyRegistry>,
    config: SnapshotConfig,
}

impl SnapshotCodec {
    pub fn new(registry: Arc<KeyRegistry>, config: SnapshotConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Serialize store values into a backup blob.
    ///
    /// Entries are written in registry order. A `None` value is written as
    /// JSON `null`. Registered keys missing from `values` are left out of the
    /// blob entirely.
    ///
    /// # Errors
    /// Returns `ExportError::Registry` for a key the registry does not know,
    /// and `ExportError::Serialization` naming the key whose value could not
    /// be converted to JSON.
    pub fn encode<V, C>(
        &self,
        values: &BTreeMap<String, Option<V>>,
        clock: &C,
    ) -> Result<String, ExportError>
    where
        V: Serialize,
        C: Clock + ?Sized,
    {
        for internal_id in values.keys() {
            self.registry.resolve_external_field(internal_id)?;
        }

        let mut entries = Map::new();
        for descriptor in self.registry.list_keys() {
            let Some(value) = values.get(&descriptor.internal_id) else {
                continue;
            };

            // to_value builds an owned tree, so later changes to the caller's
            // data never reach the emitted blob.
            let json = match value {
                Some(value) => {
                    serde_json::to_value(value).map_err(|source| SerializationError {
                        key: descriptor.internal_id.clone(),
                        source,
                    })?
                }
                None => Value::Null,
            };
            entries.insert(descriptor.external_field.clone(), json);
        }

        let backup = WireBackup {
            meta: WireMeta {
                schema: CURRENT_SCHEMA_VERSION,
                exported_at: format_timestamp(clock.now()),
            },
            entries,
        };

        debug!(entries = backup.entries.len(), "encoded backup");

        serde_json::to_string_pretty(&backup).map_err(|source| {
            ExportError::Serialization(SerializationError {
                key: ENTRIES_FIELD.to_string(),
                source,
            })
        })
    }

    /// Parse and validate a backup blob.
    pub fn decode(&self, blob: impl AsRef<[u8]>) -> Result<Snapshot, DecodeError> {
        let blob = blob.as_ref();
        self.check_size(blob.len() as u64)?;

        let root: Value =
            serde_json::from_slice(blob).map_err(|source| DecodeError::Malformed { source })?;

        let meta = root
            .get(META_FIELD)
            .and_then(Value::as_object)
            .ok_or(DecodeError::MissingMeta)?;
        let schema = meta.get(SCHEMA_FIELD).ok_or(DecodeError::MissingMeta)?;

        let schema_version = match schema.as_u64() {
            Some(version) if version == u64::from(CURRENT_SCHEMA_VERSION) => CURRENT_SCHEMA_VERSION,
            _ => {
                return Err(DecodeError::UnsupportedSchema {
                    found: schema.clone(),
                })
            }
        };

        let exported_at = meta
            .get(EXPORTED_AT_FIELD)
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        let container = root
            .get(ENTRIES_FIELD)
            .and_then(Value::as_object)
            .ok_or(DecodeError::MissingEntries)?;

        let mut entries = BTreeMap::new();
        let mut ignored_fields = Vec::new();

        for (field, value) in container {
            match self.registry.resolve_internal_id(field) {
                Ok(internal_id) => {
                    entries.insert(internal_id.to_string(), value.clone());
                }
                Err(_) => match self.config.unknown_fields {
                    UnknownFieldPolicy::Ignore => {
                        debug!(field = %field, "ignoring unregistered backup field");
                        ignored_fields.push(field.clone());
                    }
                    UnknownFieldPolicy::Reject => {
                        warn!(field = %field, "rejecting backup with unregistered field");
                        return Err(DecodeError::UnknownField {
                            field: field.clone(),
                        });
                    }
                },
            }
        }

        Ok(Snapshot {
            meta: SnapshotMeta {
                schema_version,
                exported_at,
            },
            entries,
            ignored_fields,
        })
    }

    /// Reject input larger than the configured ceiling.
    pub fn check_size(&self, size: u64) -> Result<(), DecodeError> {
        let limit = self.config.max_blob_bytes as u64;
        if size > limit {
            return Err(DecodeError::TooLarge { size, limit });
        }
        Ok(())
    }
}

/// Render a timestamp the way a browser's `Date.toISOString()` does.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}
