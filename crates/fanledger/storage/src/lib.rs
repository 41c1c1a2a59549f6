//! Fanledger storage abstractions.
//!
//! This crate defines the storage contract for the points economy:
//! - the ledger of accounts and participant aggregates
//! - the append-only action log (votes, alliances, donation entries)
//! - donation objectives and read-only participant content
//! - atomic commit of engine deltas, re-validated at write time
//!
//! Design stance:
//! - the store is the single authority for the final write decision; a delta
//!   computed from a stale snapshot is rejected, never partially applied
//! - uniqueness (one vote per account/participant/day, one open alliance per
//!   account, one donation entry per account/objective) is enforced here

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use error::{StorageError, StorageResult};
pub use traits::{
    AccountStore, ActionLogStore, CommitStore, ContentStore, LedgerStore, ObjectiveStore,
    ParticipantStore, QueryWindow,
};
