//! Read-side aggregation over the ledger and the action log.
//!
//! The pure functions work on values already read from the store; the async
//! ones read what they need themselves. None of them write.

use crate::error::LedgerResult;
use chrono::{DateTime, NaiveDate, Utc};
use fanledger_storage::{ActionLogStore, LedgerStore, ObjectiveStore, ParticipantStore};
use fanledger_types::{
    AccountId, Alliance, DonationObjective, EconomyPolicy, ObjectiveId, Participant,
    ParticipantId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Participants by points descending, ties by id ascending.
pub fn leaderboard(mut participants: Vec<Participant>) -> Vec<Participant> {
    participants.sort_by(|a, b| b.points_total.cmp(&a.points_total).then(a.id.cmp(&b.id)));
    participants
}

/// Votes of `participant` as a percentage of the leader's votes, rounded to two
/// decimals. The leader is the first leaderboard entry; zero leader votes count
/// as one.
pub fn affinity(participant: &Participant, leaderboard: &[Participant]) -> f64 {
    let Some(top) = leaderboard.first() else {
        return 0.0;
    };
    let base = top.votes_received.max(1) as f64;
    let pct = participant.votes_received as f64 / base * 100.0;
    (pct * 100.0).round() / 100.0
}

/// Whole percent of the threshold reached. Not clamped above 100.
pub fn objective_progress(objective: &DonationObjective) -> i64 {
    if objective.threshold <= 0 {
        return 100;
    }
    // Integer floor division; both operands are non-negative.
    objective.accumulated.saturating_mul(100) / objective.threshold
}

/// Whole days between the start of an open alliance and `today`.
pub fn days_allied(alliance: &Alliance, today: NaiveDate) -> i64 {
    (today - alliance.started_at.date_naive()).num_days().max(0)
}

/// Open alliances pointing at a participant.
pub async fn alliance_count(
    store: &dyn LedgerStore,
    participant_id: ParticipantId,
) -> LedgerResult<i64> {
    Ok(store.open_alliance_count(participant_id).await?)
}

/// Participants `account_id` voted for on `day`.
pub async fn user_daily_vote_index(
    store: &dyn LedgerStore,
    account_id: AccountId,
    day: NaiveDate,
) -> LedgerResult<BTreeSet<ParticipantId>> {
    let votes = store.votes_on_day(account_id, day).await?;
    Ok(votes.into_iter().map(|v| v.participant_id).collect())
}

/// A participant whose stored counters disagree with the vote log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterDrift {
    pub participant_id: ParticipantId,
    pub recorded_votes: i64,
    pub logged_votes: i64,
    pub recorded_points: i64,
    pub expected_points: i64,
}

/// An objective whose stored progress disagrees with its donation entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveDrift {
    pub objective_id: ObjectiveId,
    pub recorded_accumulated: i64,
    pub logged_accumulated: i64,
    pub recorded_active: bool,
    pub expected_active: bool,
}

/// Result of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub checked_at: Option<DateTime<Utc>>,
    pub participants_checked: usize,
    pub objectives_checked: usize,
    pub participant_drift: Vec<CounterDrift>,
    pub objective_drift: Vec<ObjectiveDrift>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.participant_drift.is_empty() && self.objective_drift.is_empty()
    }
}

/// Recompute every aggregate counter from the log and report disagreements.
///
/// Expected points assume `policy.vote_points_award` has not changed since the
/// votes were cast.
pub async fn reconcile(
    store: &dyn LedgerStore,
    policy: &EconomyPolicy,
) -> LedgerResult<ReconciliationReport> {
    let participants = store.list_participants().await?;
    let vote_counts = store.vote_counts().await?;
    let objectives = store.list_objectives(false).await?;
    let donation_totals = store.donation_totals().await?;

    let participant_drift: Vec<CounterDrift> = participants
        .iter()
        .filter_map(|p| {
            let logged_votes = vote_counts.get(&p.id).copied().unwrap_or(0);
            let expected_points = logged_votes.saturating_mul(policy.vote_points_award);
            (p.votes_received != logged_votes || p.points_total != expected_points).then(|| {
                CounterDrift {
                    participant_id: p.id,
                    recorded_votes: p.votes_received,
                    logged_votes,
                    recorded_points: p.points_total,
                    expected_points,
                }
            })
        })
        .collect();

    let objective_drift: Vec<ObjectiveDrift> = objectives
        .iter()
        .filter_map(|o| {
            let logged_accumulated = donation_totals.get(&o.id).copied().unwrap_or(0);
            let expected_active = logged_accumulated < o.threshold;
            (o.accumulated != logged_accumulated || o.active != expected_active).then(|| {
                ObjectiveDrift {
                    objective_id: o.id,
                    recorded_accumulated: o.accumulated,
                    logged_accumulated,
                    recorded_active: o.active,
                    expected_active,
                }
            })
        })
        .collect();

    let report = ReconciliationReport {
        checked_at: Some(Utc::now()),
        participants_checked: participants.len(),
        objectives_checked: objectives.len(),
        participant_drift,
        objective_drift,
    };

    if report.is_clean() {
        info!(
            participants = report.participants_checked,
            objectives = report.objectives_checked,
            "ledger reconciled clean"
        );
    } else {
        warn!(
            participant_drift = report.participant_drift.len(),
            objective_drift = report.objective_drift.len(),
            "ledger counters drifted from the action log"
        );
    }
    Ok(report)
}
