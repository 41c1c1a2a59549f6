use fanledger_engine::Denial;
use fanledger_storage::StorageError;
use fanledger_types::ObjectiveId;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Every way a point-spending action or ledger query can fail.
///
/// All variants are recoverable outcomes. `Storage` carries backend faults the
/// caller can only report.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: required {required} points, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("duplicate action: {0}")]
    DuplicateAction(String),

    #[error("invalid amount: {0} (must be positive)")]
    InvalidAmount(i64),

    #[error("objective {0} is no longer accepting donations")]
    ObjectiveClosed(ObjectiveId),

    /// A concurrent write won the race, even after the retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected administrative input (empty names, non-positive credits).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl LedgerError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::DuplicateAction(_) => "duplicate_action",
            LedgerError::InvalidAmount(_) => "invalid_amount",
            LedgerError::ObjectiveClosed(_) => "objective_closed",
            LedgerError::Conflict(_) => "conflict",
            LedgerError::NotFound(_) => "not_found",
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::Storage(_) => "storage_error",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<Denial> for LedgerError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::InsufficientBalance {
                required,
                available,
            } => LedgerError::InsufficientBalance {
                required,
                available,
            },
            Denial::DuplicateAction { .. } => LedgerError::DuplicateAction(denial.to_string()),
            Denial::InvalidAmount { amount } => LedgerError::InvalidAmount(amount),
            Denial::ObjectiveClosed { objective_id } => LedgerError::ObjectiveClosed(objective_id),
        }
    }
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => LedgerError::NotFound(msg),
            StorageError::Conflict(msg) => LedgerError::Conflict(msg),
            StorageError::Duplicate(msg) => LedgerError::DuplicateAction(msg),
            StorageError::InvalidInput(msg) => LedgerError::InvalidInput(msg),
            other => LedgerError::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fanledger_types::{AccountId, ParticipantId};

    #[test]
    fn denials_keep_their_codes() {
        let denial = Denial::DuplicateAction {
            account_id: AccountId(1),
            participant_id: ParticipantId(2),
            day: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        };
        let code = denial.code();
        let err = LedgerError::from(denial);
        assert_eq!(err.code(), code);
        assert!(err.to_string().contains("2025-03-01"));

        let err = LedgerError::from(Denial::ObjectiveClosed {
            objective_id: ObjectiveId(4),
        });
        assert_eq!(err.code(), "objective_closed");
    }

    #[test]
    fn storage_errors_are_classified() {
        assert!(LedgerError::from(StorageError::Conflict("slot moved".into())).is_conflict());
        assert_eq!(
            LedgerError::from(StorageError::Duplicate("vote".into())).code(),
            "duplicate_action"
        );
        assert_eq!(
            LedgerError::from(StorageError::NotFound("account 9".into())).code(),
            "not_found"
        );
        assert_eq!(
            LedgerError::from(StorageError::Backend("io".into())).code(),
            "storage_error"
        );
    }
}
