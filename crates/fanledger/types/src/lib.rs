//! Fanledger Types - shared domain model for the points economy.
//!
//! - identifiers for ledger entities and log records
//! - ledger entities (accounts, participants, objectives) and immutable log
//!   records (votes, alliances, donation entries)
//! - snapshots read before a decision, deltas produced by the eligibility
//!   engine and receipts returned by a committed delta
//! - the economy policy (action costs and rewards)

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod delta;
mod ids;
mod model;
mod policy;

pub use delta::{
    AllianceDelta, AllianceReceipt, AllianceSnapshot, CounterOverflow, DonationDelta,
    DonationReceipt, DonationSnapshot, VoteDelta, VoteReceipt, VoteSnapshot,
};
pub use ids::{AccountId, AllianceId, ChallengeId, ObjectiveId, ParticipantId, VideoId, VoteId};
pub use model::{
    calendar_day, Account, Alliance, Challenge, DonationLedgerEntry, DonationObjective,
    NewChallenge, NewObjective, NewParticipant, NewVideo, Participant, TopVideo, VoteRecord,
};
pub use policy::EconomyPolicy;
