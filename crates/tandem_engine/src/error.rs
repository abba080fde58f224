//! Error types for the sync engine.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that abort a whole batch.
///
/// Per-change problems (a rejected record, a failed apply) are reported
/// in the batch summary instead; only infrastructure failures surface
/// here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The metadata store is unavailable or corrupted.
    #[error("store error: {0}")]
    Store(#[from] tandem_store::StoreError),
}

/// Failure returned by an applier for one change.
#[derive(Debug, Error)]
#[error("apply failed: {message}")]
pub struct ApplyError {
    /// What went wrong.
    pub message: String,
    /// Whether a later retry may succeed.
    pub retryable: bool,
}

impl ApplyError {
    /// Creates a retryable failure.
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a permanent failure.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_error_retryability() {
        assert!(ApplyError::retryable("timeout").retryable);
        assert!(!ApplyError::fatal("no permission").retryable);
    }

    #[test]
    fn apply_error_display() {
        let err = ApplyError::fatal("disk full");
        assert_eq!(err.to_string(), "apply failed: disk full");
    }
}
