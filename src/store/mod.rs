//! Store Interface
//!
//! The key-value surface the snapshot engine reads from and writes to. The
//! host application owns the store; the engine only goes through this trait
//! during export and restore.

pub mod file;
pub mod memory;

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use crate::error::StoreError;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Lock serializing restores against one store instance.
///
/// Restores take it exclusively and exports take it shared, whichever
/// coordinator they run through.
pub type RestoreGate = RwLock<()>;

/// A key-value persistence surface holding JSON values.
///
/// Implementations use interior mutability so a store can be shared between
/// the host application and any number of
/// [`RestoreCoordinator`](crate::RestoreCoordinator)s.
pub trait Store: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent; a store never
    /// reports `Some(Value::Null)`.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value, replacing any previous one.
    ///
    /// Writing `Value::Null` removes the key, so `null` and absence are the
    /// same state.
    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;

    /// Delete a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// The gate every coordinator working on this store shares.
    fn restore_gate(&self) -> &RestoreGate;
}

impl<T: Store + ?Sized> Store for &T {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn restore_gate(&self) -> &RestoreGate {
        (**self).restore_gate()
    }
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn restore_gate(&self) -> &RestoreGate {
        (**self).restore_gate()
    }
}

impl<T: Store + ?Sized> Store for Box<T> {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn restore_gate(&self) -> &RestoreGate {
        (**self).restore_gate()
    }
}
