use crate::ids::{AccountId, AllianceId, ChallengeId, ObjectiveId, ParticipantId, VideoId, VoteId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar day an action timestamp falls on. Days are UTC dates.
pub fn calendar_day(at: DateTime<Utc>) -> NaiveDate {
    at.date_naive()
}

/// A user's point account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub nickname: String,
    /// Spendable points. Never negative.
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// A contestant that can receive votes and allies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tiktok: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    /// Number of committed vote records referencing this participant.
    pub votes_received: i64,
    /// Points granted by committed votes.
    pub points_total: i64,
    pub removed: bool,
}

/// Input for registering a participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewParticipant {
    pub name: String,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub tiktok: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
}

impl NewParticipant {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Immutable vote log row. Unique per (account, participant, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub vote_id: VoteId,
    pub account_id: AccountId,
    pub participant_id: ParticipantId,
    pub day: NaiveDate,
    pub cast_at: DateTime<Utc>,
}

/// Exclusive affiliation between an account and a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    pub alliance_id: AllianceId,
    pub account_id: AccountId,
    pub participant_id: ParticipantId,
    pub started_at: DateTime<Utc>,
    /// `None` while the alliance is open.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Alliance {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Collective funding goal attached to a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationObjective {
    pub id: ObjectiveId,
    pub participant_id: ParticipantId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Points needed to complete the objective.
    pub threshold: i64,
    /// Exact sum of every donation ledger entry for this objective.
    pub accumulated: i64,
    /// Flips to false once `accumulated >= threshold`; never flips back.
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for opening a donation objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewObjective {
    pub participant_id: ParticipantId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: i64,
}

fn default_threshold() -> i64 {
    100
}

/// Cumulative points one account has donated to one objective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationLedgerEntry {
    pub account_id: AccountId,
    pub objective_id: ObjectiveId,
    pub total_donated: i64,
    pub first_donated_at: DateTime<Utc>,
    pub last_donated_at: DateTime<Utc>,
}

/// Highlighted video on a participant's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopVideo {
    pub id: VideoId,
    pub participant_id: ParticipantId,
    pub uploaded_at: DateTime<Utc>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVideo {
    pub participant_id: ParticipantId,
    pub url: String,
    #[serde(default = "Utc::now")]
    pub uploaded_at: DateTime<Utc>,
}

/// Challenge posted for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub participant_id: ParticipantId,
    pub posted_at: DateTime<Utc>,
    pub text: String,
    pub points: i64,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChallenge {
    pub participant_id: ParticipantId,
    pub text: String,
    #[serde(default)]
    pub points: i64,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "Utc::now")]
    pub posted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn calendar_day_uses_utc_date() {
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 23, 59, 59).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert_ne!(calendar_day(late), calendar_day(early));
        assert_eq!(
            calendar_day(late),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn new_objective_defaults_threshold() {
        let parsed: NewObjective =
            serde_json::from_str(r#"{"participant_id": 1, "title": "Stage lights"}"#).unwrap();
        assert_eq!(parsed.threshold, 100);
        assert!(parsed.description.is_none());
    }

    #[test]
    fn alliance_open_state_follows_end_time() {
        let mut alliance = Alliance {
            alliance_id: AllianceId::generate(),
            account_id: AccountId(1),
            participant_id: ParticipantId(2),
            started_at: Utc::now(),
            ended_at: None,
        };
        assert!(alliance.is_open());
        alliance.ended_at = Some(Utc::now());
        assert!(!alliance.is_open());
    }
}
