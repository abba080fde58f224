//! The applier seam.

use crate::error::ApplyError;
use parking_lot::Mutex;
use std::collections::HashSet;
use tandem_model::Change;

/// Applies ordered changes to one side.
///
/// Implemented outside the core by the collaborators that perform actual
/// filesystem mutations or remote API calls. The engine hands changes
/// over in replay-safe order and never reorders them afterwards.
pub trait Applier: Send + Sync {
    /// Applies a single change.
    fn apply(&self, change: &Change) -> Result<(), ApplyError>;
}

/// An applier that records what it receives, for tests.
#[derive(Debug, Default)]
pub struct RecordingApplier {
    applied: Mutex<Vec<Change>>,
    failing_paths: Mutex<HashSet<String>>,
}

impl RecordingApplier {
    /// Creates an applier that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every apply for the given path fail.
    pub fn fail_on(&self, path: &str) {
        self.failing_paths.lock().insert(path.to_string());
    }

    /// Returns the changes applied so far, in dispatch order.
    #[must_use]
    pub fn applied(&self) -> Vec<Change> {
        self.applied.lock().clone()
    }
}

impl Applier for RecordingApplier {
    fn apply(&self, change: &Change) -> Result<(), ApplyError> {
        if self.failing_paths.lock().contains(change.path()) {
            return Err(ApplyError::retryable(format!(
                "injected failure for {}",
                change.path()
            )));
        }
        self.applied.lock().push(change.clone());
        Ok(())
    }
}
