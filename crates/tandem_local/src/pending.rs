//! The pending-changes queue.

use tandem_model::Change;

/// Not-yet-finalized changes carried across analyzer invocations.
///
/// Typically incomplete moves still waiting for their matching unlink, or
/// changes still marked write-in-progress. The queue is a plain value
/// owned by the caller and passed by mutable reference into each analysis
/// call, so independent sync sessions can run with isolated queues.
#[derive(Debug, Default)]
pub struct PendingChanges {
    entries: Vec<Change>,
}

impl PendingChanges {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a change still awaiting correlation.
    pub fn push(&mut self, change: Change) {
        self.entries.push(change);
    }

    /// Removes and returns all queued changes, oldest first.
    pub fn drain(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.entries)
    }

    /// Iterates over the queued changes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.entries.iter()
    }

    /// Returns the number of queued changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
