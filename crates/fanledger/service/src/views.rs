//! View models handed to the presentation layer.

use crate::error::LedgerError;
use fanledger_types::{
    AccountId, Alliance, Challenge, DonationObjective, Participant, ParticipantId, TopVideo,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Ok,
    Error,
}

/// Result of a submitted action, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub status: OutcomeStatus,
    pub message: String,
    /// Machine-readable error code, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ActionOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Ok,
            message: message.into(),
            code: None,
        }
    }

    pub fn error(err: &LedgerError) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: err.to_string(),
            code: Some(err.code().to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }
}

/// Per-user state shared by every page. Empty for anonymous visitors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatus {
    pub account_id: Option<AccountId>,
    pub balance: Option<i64>,
    pub alliance: Option<Alliance>,
    pub is_allied: bool,
    pub allied_participant: Option<ParticipantId>,
    pub days_allied: i64,
    /// Participants voted for today.
    pub voted_today: BTreeSet<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub participant: Participant,
    pub affinity: f64,
    pub alliance_count: i64,
    pub voted_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeView {
    pub user: UserStatus,
    pub participants: Vec<LeaderboardRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDetail {
    pub participant: Participant,
    pub videos: Vec<TopVideo>,
    /// Newest first.
    pub challenges: Vec<Challenge>,
    /// Whether the viewing account's open alliance is with this participant.
    pub alliance_active: bool,
    pub alliance_count: i64,
    pub voted_today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveProgressRow {
    pub objective: DonationObjective,
    pub progress: i64,
    /// Points the viewing account has given to this objective so far.
    pub viewer_donated: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaygroundView {
    pub user: UserStatus,
    pub removed_participants: Vec<Participant>,
    /// Every participant's challenges, newest first.
    pub challenges: Vec<Challenge>,
    pub objectives: Vec<ObjectiveProgressRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_status_in_lowercase() {
        let ok = serde_json::to_value(ActionOutcome::ok("done")).unwrap();
        assert_eq!(ok["status"], "ok");
        assert!(ok.get("code").is_none());

        let err = ActionOutcome::error(&LedgerError::InvalidAmount(0));
        assert!(!err.is_ok());
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["code"], "invalid_amount");
    }
}
