//! Key Registry
//!
//! Declares which named state entries participate in a snapshot and how each
//! internal store key is spelled inside a backup blob.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// One registered state slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDescriptor {
    /// Key under which the host application stores the value.
    pub internal_id: String,

    /// Field name used for the value inside a backup blob.
    pub external_field: String,
}

impl KeyDescriptor {
    pub fn new(internal_id: impl Into<String>, external_field: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
            external_field: external_field.into(),
        }
    }

    /// A descriptor whose store key and blob field are spelled the same.
    pub fn same(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            internal_id: name.clone(),
            external_field: name,
        }
    }
}

/// Ordered, immutable set of snapshot-eligible keys.
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    descriptors: Vec<KeyDescriptor>,
    by_internal: HashMap<String, usize>,
    by_external: HashMap<String, usize>,
}

impl KeyRegistry {
    /// Build a registry from descriptors, keeping their order.
    ///
    /// # Errors
    /// Returns `RegistryError::DuplicateKey` or `RegistryError::DuplicateField`
    /// if either name space contains a repeat.
    pub fn new(descriptors: impl IntoIterator<Item = KeyDescriptor>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            descriptors: Vec::new(),
            by_internal: HashMap::new(),
            by_external: HashMap::new(),
        };

        for descriptor in descriptors {
            if registry.by_internal.contains_key(&descriptor.internal_id) {
                return Err(RegistryError::DuplicateKey {
                    internal_id: descriptor.internal_id,
                });
            }
            if registry.by_external.contains_key(&descriptor.external_field) {
                return Err(RegistryError::DuplicateField {
                    external_field: descriptor.external_field,
                });
            }

            let index = registry.descriptors.len();
            registry
                .by_internal
                .insert(descriptor.internal_id.clone(), index);
            registry
                .by_external
                .insert(descriptor.external_field.clone(), index);
            registry.descriptors.push(descriptor);
        }

        Ok(registry)
    }

    /// Start building a registry one key at a time.
    pub fn builder() -> KeyRegistryBuilder {
        KeyRegistryBuilder::default()
    }

    /// The keys persisted by the MatchDay Coach app.
    pub fn matchday() -> Self {
        Self::builder()
            .key("saved-games", "savedSoccerGames")
            .key("app-settings", "soccerAppSettings")
            .key("seasons-list", "soccerSeasons")
            .key("tournaments-list", "soccerTournaments")
            .key("master-roster", "soccerMasterRoster")
            .key("last-home-team-name", "lastHomeTeamName")
            .build()
            .unwrap_or_else(|_| unreachable!("matchday registry has no duplicates"))
    }

    /// All registered keys in declaration order.
    pub fn list_keys(&self) -> &[KeyDescriptor] {
        &self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn contains_key(&self, internal_id: &str) -> bool {
        self.by_internal.contains_key(internal_id)
    }

    /// Map a store key to its blob field name.
    pub fn resolve_external_field(&self, internal_id: &str) -> Result<&str, RegistryError> {
        self.by_internal
            .get(internal_id)
            .map(|&index| self.descriptors[index].external_field.as_str())
            .ok_or_else(|| RegistryError::UnknownKey {
                internal_id: internal_id.to_string(),
            })
    }

    /// Map a blob field name back to its store key.
    pub fn resolve_internal_id(&self, external_field: &str) -> Result<&str, RegistryError> {
        self.by_external
            .get(external_field)
            .map(|&index| self.descriptors[index].internal_id.as_str())
            .ok_or_else(|| RegistryError::UnknownField {
                external_field: external_field.to_string(),
            })
    }
}

/// Builder for [`KeyRegistry`].
#[derive(Debug, Default)]
pub struct KeyRegistryBuilder {
    descriptors: Vec<KeyDescriptor>,
}

impl KeyRegistryBuilder {
    /// Register a key whose blob field differs from its store key.
    pub fn key(mut self, internal_id: impl Into<String>, external_field: impl Into<String>) -> Self {
        self.descriptors
            .push(KeyDescriptor::new(internal_id, external_field));
        self
    }

    /// Register a key spelled the same in the store and in the blob.
    pub fn same(mut self, name: impl Into<String>) -> Self {
        self.descriptors.push(KeyDescriptor::same(name));
        self
    }

    pub fn build(self) -> Result<KeyRegistry, RegistryError> {
        KeyRegistry::new(self.descriptors)
    }
}
