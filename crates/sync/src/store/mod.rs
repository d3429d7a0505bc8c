//! Durable local shadow store.
//!
//! [`KeyedRecordStore`] maps a string key to a JSON-serialized record
//! collection on top of an abstract [`StorageMedium`] (the process-wide
//! persistent key/string store). It has no knowledge of network state and
//! favors availability over surfacing storage errors: a missing key or
//! corrupt payload reads as an empty collection, and a failed write is
//! retried once, then dropped and logged - local storage is the
//! last-resort layer, there is nothing below it to fall back to.
//!
//! Writes are whole-collection replace; read-modify-write belongs to the
//! caller (the coordinator serializes it per domain).

mod file;
mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileMedium;
pub use memory::MemoryMedium;

/// Failure writing to the storage medium.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The medium is out of room.
    #[error("storage capacity exceeded")]
    CapacityExceeded,

    /// Any other medium failure.
    #[error("storage failure: {0}")]
    Io(String),
}

/// A synchronous, origin-scoped key/string store.
///
/// The local durable medium shared by all domains in one client; each
/// domain prefixes its keys with a disjoint namespace so domains can never
/// corrupt each other.
pub trait StorageMedium: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CapacityExceeded`] when the medium is out
    /// of room, [`StorageError::Io`] otherwise.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the value stored under `key`, if any.
    fn remove_item(&self, key: &str);
}

/// Durable map from key to record collection for one domain namespace.
pub struct KeyedRecordStore<R> {
    medium: Arc<dyn StorageMedium>,
    namespace: &'static str,
    _records: PhantomData<fn() -> R>,
}

impl<R> KeyedRecordStore<R>
where
    R: Serialize + DeserializeOwned,
{
    #[must_use]
    pub fn new(medium: Arc<dyn StorageMedium>, namespace: &'static str) -> Self {
        Self {
            medium,
            namespace,
            _records: PhantomData,
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Read the collection stored under `key`.
    ///
    /// Never fails: a missing key yields an empty collection, and a
    /// corrupt payload is discarded (logged) rather than surfaced.
    #[must_use]
    pub fn read(&self, key: &str) -> Vec<R> {
        let Some(raw) = self.medium.get_item(&self.storage_key(key)) else {
            return Vec::new();
        };

        match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(
                    namespace = self.namespace,
                    key,
                    error = %err,
                    "discarding corrupt shadow data"
                );
                Vec::new()
            }
        }
    }

    /// Replace the collection stored under `key`.
    ///
    /// A failed write is retried once and then dropped with an error log;
    /// callers never see storage failures.
    pub fn write(&self, key: &str, records: &[R]) {
        let payload = match serde_json::to_string(records) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(
                    namespace = self.namespace,
                    key,
                    error = %err,
                    "shadow data failed to serialize; write dropped"
                );
                return;
            }
        };

        let storage_key = self.storage_key(key);
        if let Err(first) = self.medium.set_item(&storage_key, &payload)
            && let Err(second) = self.medium.set_item(&storage_key, &payload)
        {
            tracing::error!(
                namespace = self.namespace,
                key,
                first_attempt = %first,
                error = %second,
                "shadow write dropped after retry"
            );
        }
    }

    /// Remove the collection stored under `key`.
    pub fn clear(&self, key: &str) {
        self.medium.remove_item(&self.storage_key(key));
    }
}
