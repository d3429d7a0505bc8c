//! In-memory storage medium.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{StorageError, StorageMedium};

/// Volatile [`StorageMedium`] backed by a map.
///
/// Used by tests and by embedders that supply their own durable medium.
/// An optional byte capacity mimics the size-bounded persistent stores
/// this layer is deployed against.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryMedium {
    /// Unbounded medium.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium that rejects writes once keys plus values would exceed
    /// `capacity_bytes`.
    #[must_use]
    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    fn used_bytes(entries: &HashMap<String, String>, replacing: &str) -> usize {
        entries
            .iter()
            .filter(|(key, _)| key.as_str() != replacing)
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();

        if let Some(capacity) = self.capacity_bytes {
            let projected = Self::used_bytes(&entries, key) + key.len() + value.len();
            if projected > capacity {
                return Err(StorageError::CapacityExceeded);
            }
        }

        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
