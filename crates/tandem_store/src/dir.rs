//! Store directory management.
//!
//! Filesystem layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK           # Advisory lock, one process per store
//! └─ journal.log    # Append-only metadata journal
//! ```
//!
//! The LOCK file ensures only one sync client writes a given store at a
//! time; a second open fails with [`StoreError::StoreLocked`].

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const JOURNAL_FILE: &str = "journal.log";

/// Holds the store directory and its exclusive process lock.
///
/// The advisory lock is held for the lifetime of the value and released
/// when it is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle, held for exclusive access.
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its exclusive lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the directory is missing and `create_if_missing` is false
    /// - the path exists but is not a directory
    /// - another process holds the lock ([`StoreError::StoreLocked`])
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::corrupted(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::corrupted(format!(
                "store path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the metadata journal.
    #[must_use]
    pub fn journal_path(&self) -> PathBuf {
        self.path.join(JOURNAL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("fresh");

        assert!(!path.exists());
        let dir = StoreDir::open(&path, true).unwrap();
        assert!(path.is_dir());
        assert_eq!(dir.journal_path(), path.join("journal.log"));
    }

    #[test]
    fn open_without_create_fails_on_missing_dir() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing");

        assert!(StoreDir::open(&path, false).is_err());
    }

    #[test]
    fn second_open_is_rejected_while_locked() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("locked");

        let _held = StoreDir::open(&path, true).unwrap();
        let result = StoreDir::open(&path, true);
        assert!(matches!(result, Err(StoreError::StoreLocked)));
    }

    #[test]
    fn lock_is_released_on_drop() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("reopen");

        {
            let _dir = StoreDir::open(&path, true).unwrap();
        }
        let _again = StoreDir::open(&path, true).unwrap();
    }
}
