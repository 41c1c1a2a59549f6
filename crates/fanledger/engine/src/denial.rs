use chrono::NaiveDate;
use fanledger_types::{AccountId, ObjectiveId, ParticipantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of an eligibility check: the delta to commit, or why not.
pub type Decision<D> = Result<D, Denial>;

/// Business-rule refusals. Recoverable and user-facing.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denial {
    #[error("insufficient balance: required {required} points, available {available}")]
    InsufficientBalance { required: i64, available: i64 },

    #[error("account {account_id} already voted for participant {participant_id} on {day}")]
    DuplicateAction {
        account_id: AccountId,
        participant_id: ParticipantId,
        day: NaiveDate,
    },

    #[error("invalid amount: {amount} (must be positive)")]
    InvalidAmount { amount: i64 },

    #[error("objective {objective_id} is no longer accepting donations")]
    ObjectiveClosed { objective_id: ObjectiveId },
}

impl Denial {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Denial::InsufficientBalance { .. } => "insufficient_balance",
            Denial::DuplicateAction { .. } => "duplicate_action",
            Denial::InvalidAmount { .. } => "invalid_amount",
            Denial::ObjectiveClosed { .. } => "objective_closed",
        }
    }
}

pub(crate) fn require_balance(available: i64, required: i64) -> Result<(), Denial> {
    if available < required {
        return Err(Denial::InsufficientBalance {
            required,
            available,
        });
    }
    Ok(())
}
