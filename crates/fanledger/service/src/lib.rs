//! Fanledger Service - coordinated point spending and read models.
//!
//! - [`TransactionCoordinator`] applies votes, alliances and donations as
//!   snapshot, decision and atomic commit, retrying once on a lost race
//! - [`queries`] derives leaderboards, affinity, objective progress and the
//!   reconciliation report from ledger and log state
//! - [`FanLedger`] is the boundary used by the presentation layer

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod coordinator;
mod error;
mod facade;
pub mod queries;
mod views;

pub use coordinator::{TransactionCoordinator, MAX_ATTEMPTS};
pub use error::{LedgerError, LedgerResult};
pub use facade::FanLedger;
pub use queries::{CounterDrift, ObjectiveDrift, ReconciliationReport};
pub use views::{
    ActionOutcome, HomeView, LeaderboardRow, ObjectiveProgressRow, OutcomeStatus,
    ParticipantDetail, PlaygroundView, UserStatus,
};
