//! Store fixtures.

use crate::builders::{metadir, metafile};
use std::ops::Deref;
use std::path::PathBuf;
use tandem_store::Store;
use tempfile::TempDir;

/// A throwaway store with automatic cleanup.
pub struct TestStore {
    /// The store under test.
    pub store: Store,
    /// Kept alive so the directory outlives the test.
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Opens an in-memory test store.
    #[must_use]
    pub fn memory() -> Self {
        Self {
            store: Store::open_in_memory().expect("open in-memory store"),
            _temp_dir: None,
        }
    }

    /// Opens a file-backed test store in a temporary directory.
    #[must_use]
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("create temp directory");
        let store = Store::open(&temp_dir.path().join("store")).expect("open file store");
        Self {
            store,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory for file-backed stores.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join("store"))
    }

    /// Seeds the store with one parent folder holding three files and
    /// three folders, the shape most lookup tests expect.
    pub fn seed_sample_tree(&self) {
        self.store
            .put(&metadir("my-folder").build())
            .expect("seed parent");
        for i in 1..=3 {
            self.store
                .put(&metafile(&format!("my-folder/file-{i}")).ino(i).build())
                .expect("seed file");
            self.store
                .put(&metadir(&format!("my-folder/folder-{i}")).build())
                .expect("seed folder");
        }
    }
}

impl Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Renders all live records as pretty JSON, for golden comparisons and
/// debugging assertions.
#[must_use]
pub fn records_json(store: &Store) -> String {
    let records = store.records().expect("list records");
    serde_json::to_string_pretty(&records).expect("serialize records")
}
