//! Snapshots, deltas and receipts.
//!
//! A snapshot is what the coordinator read before deciding. A delta is the
//! engine's decision: the exact state change a commit must apply. A receipt is
//! what the store reports after the delta landed.
//!
//! The `apply` helpers define the state transition once so that every backend
//! and every test shares the same arithmetic. They assume the delta was
//! re-validated against the state being mutated, and they leave the state
//! untouched when a counter would leave the `i64` range.

use crate::ids::{AccountId, AllianceId, ObjectiveId};
use crate::model::{
    Account, Alliance, DonationLedgerEntry, DonationObjective, Participant, VoteRecord,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A ledger counter would leave the `i64` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{counter} would overflow")]
pub struct CounterOverflow {
    pub counter: &'static str,
}

fn add(counter: &'static str, value: i64, amount: i64) -> Result<i64, CounterOverflow> {
    value.checked_add(amount).ok_or(CounterOverflow { counter })
}

fn sub(counter: &'static str, value: i64, amount: i64) -> Result<i64, CounterOverflow> {
    value.checked_sub(amount).ok_or(CounterOverflow { counter })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteSnapshot {
    pub account: Account,
    pub participant: Participant,
    /// Whether a vote already exists for (account, participant, day).
    pub already_voted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllianceSnapshot {
    pub account: Account,
    pub participant: Participant,
    pub open_alliance: Option<Alliance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationSnapshot {
    pub account: Account,
    pub objective: DonationObjective,
}

/// Debit the voter, bump the participant counters, append the vote row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteDelta {
    pub vote: VoteRecord,
    pub cost: i64,
    pub points_awarded: i64,
}

impl VoteDelta {
    pub fn apply(
        &self,
        account: &mut Account,
        participant: &mut Participant,
    ) -> Result<(), CounterOverflow> {
        let balance = sub("account balance", account.balance, self.cost)?;
        let votes = add("participant votes", participant.votes_received, 1)?;
        let points = add(
            "participant points",
            participant.points_total,
            self.points_awarded,
        )?;

        account.balance = balance;
        participant.votes_received = votes;
        participant.points_total = points;
        Ok(())
    }
}

/// Close the observed open alliance, debit, open the new alliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceDelta {
    pub account_id: AccountId,
    /// Open alliance observed in the snapshot. The commit fails with a
    /// conflict if the account's open slot no longer holds exactly this.
    pub closes: Option<AllianceId>,
    pub opens: Alliance,
    pub cost: i64,
}

impl AllianceDelta {
    pub fn switched_at(&self) -> DateTime<Utc> {
        self.opens.started_at
    }

    pub fn close(&self, previous: &mut Alliance) {
        previous.ended_at = Some(self.switched_at());
    }

    pub fn apply(&self, account: &mut Account) -> Result<(), CounterOverflow> {
        account.balance = sub("account balance", account.balance, self.cost)?;
        Ok(())
    }
}

/// Debit the donor, grow the objective, accumulate the donor's entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationDelta {
    pub account_id: AccountId,
    pub objective_id: ObjectiveId,
    pub amount: i64,
    pub donated_at: DateTime<Utc>,
}

impl DonationDelta {
    pub fn apply(
        &self,
        account: &mut Account,
        objective: &mut DonationObjective,
        entry: Option<DonationLedgerEntry>,
    ) -> Result<DonationLedgerEntry, CounterOverflow> {
        let balance = sub("account balance", account.balance, self.amount)?;
        let accumulated = add("objective total", objective.accumulated, self.amount)?;
        let entry = match entry {
            Some(mut existing) => {
                existing.total_donated = add("donor total", existing.total_donated, self.amount)?;
                existing.last_donated_at = self.donated_at;
                existing
            }
            None => DonationLedgerEntry {
                account_id: self.account_id,
                objective_id: self.objective_id,
                total_donated: self.amount,
                first_donated_at: self.donated_at,
                last_donated_at: self.donated_at,
            },
        };

        account.balance = balance;
        objective.accumulated = accumulated;
        if accumulated >= objective.threshold {
            objective.active = false;
        }
        Ok(entry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote: VoteRecord,
    pub balance_after: i64,
    pub participant_votes: i64,
    pub participant_points: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceReceipt {
    pub alliance: Alliance,
    pub closed: Option<AllianceId>,
    pub balance_after: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationReceipt {
    pub entry: DonationLedgerEntry,
    pub balance_after: i64,
    pub objective_accumulated: i64,
    pub objective_active: bool,
}
