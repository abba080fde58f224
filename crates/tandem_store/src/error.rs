//! Error types for the metadata store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] tandem_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record violates a reconciliation invariant. The write was
    /// rejected before any mutation; the caller can correct the record
    /// and retry.
    #[error("invalid record: {reason}")]
    InvalidRecord {
        /// What the record got wrong.
        reason: String,
    },

    /// The write carried a stale revision. The caller should re-read the
    /// record and retry; unrelated records are unaffected.
    #[error("revision conflict on {id}: expected {expected}, got {actual}")]
    Conflict {
        /// Identifier of the conflicting record.
        id: String,
        /// Revision currently stored.
        expected: u64,
        /// Revision the write carried.
        actual: u64,
    },

    /// The record is definitely absent. Distinct from infrastructure
    /// errors so callers can branch on "absent" versus "unavailable".
    #[error("record not found: {id}")]
    NotFound {
        /// Identifier that was looked up.
        id: String,
    },

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The journal or store directory is not usable.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates an invalid-record error.
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            reason: reason.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns true for the definitely-absent lookup outcome.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
