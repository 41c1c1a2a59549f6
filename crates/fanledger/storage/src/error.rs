use fanledger_types::CounterOverflow;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    /// The delta was computed from state that changed before the commit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A uniqueness constraint on the action log rejected the row.
    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<CounterOverflow> for StorageError {
    fn from(err: CounterOverflow) -> Self {
        StorageError::InvalidInput(err.to_string())
    }
}
