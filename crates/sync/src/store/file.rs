//! File-backed storage medium.

use std::io;
use std::path::{Path, PathBuf};

use super::{StorageError, StorageMedium};

/// Durable [`StorageMedium`] storing one file per key under a directory.
///
/// The on-disk analog of origin-scoped browser storage: values survive
/// process restarts, and writes go through a temp-file rename so a crash
/// mid-write never leaves a half-written value behind.
#[derive(Debug, Clone)]
pub struct FileMedium {
    dir: PathBuf,
}

impl FileMedium {
    /// Open (creating if needed) a medium rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|err| StorageError::Io(err.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are "<namespace>:<owner id>"; flatten to a safe file name.
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn write_atomic(path: &Path, value: &str) -> io::Result<()> {
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, path)
    }
}

impl StorageMedium for FileMedium {
    fn get_item(&self, key: &str) -> Option<String> {
        std::fs::read_to_string(self.path_for(key)).ok()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::write_atomic(&self.path_for(key), value).map_err(|err| {
            if err.kind() == io::ErrorKind::StorageFull {
                StorageError::CapacityExceeded
            } else {
                StorageError::Io(err.to_string())
            }
        })
    }

    fn remove_item(&self, key: &str) {
        let _ = std::fs::remove_file(self.path_for(key));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "farmlink-file-medium-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_round_trip_survives_reopen() {
        let dir = temp_dir("reopen");
        {
            let medium = FileMedium::new(&dir).unwrap();
            medium.set_item("cart:owner-1", "[1,2,3]").unwrap();
        }
        let medium = FileMedium::new(&dir).unwrap();
        assert_eq!(medium.get_item("cart:owner-1").as_deref(), Some("[1,2,3]"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = temp_dir("missing");
        let medium = FileMedium::new(&dir).unwrap();
        assert!(medium.get_item("cart:nobody").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_remove_item() {
        let dir = temp_dir("remove");
        let medium = FileMedium::new(&dir).unwrap();
        medium.set_item("session:current", "{}").unwrap();
        medium.remove_item("session:current");
        assert!(medium.get_item("session:current").is_none());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_keys_with_separators_do_not_escape_the_dir() {
        let dir = temp_dir("escape");
        let medium = FileMedium::new(&dir).unwrap();
        medium.set_item("cart:../../etc/owner", "x").unwrap();

        // Whatever the flattened name is, it lives inside the medium dir.
        let entries: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
