//! # fanledger-engine
//!
//! The eligibility engine decides whether a point-spending action is allowed
//! and, when it is, computes the exact delta the transaction coordinator must
//! commit.
//!
//! Every check is a pure function of `(policy, snapshot, inputs)`: no I/O, no
//! clock reads, no id allocation beyond the log row ids embedded in the delta.
//! The store re-validates the delta at commit time because the snapshot may be
//! stale by then.
//!
//! | Check | Denials (in evaluation order) |
//! |-------|-------------------------------|
//! | [`check_vote`] | `DuplicateAction`, `InsufficientBalance` |
//! | [`check_alliance`] | `InsufficientBalance` |
//! | [`check_donation`] | `InvalidAmount`, `InsufficientBalance`, `ObjectiveClosed`, `InvalidAmount` (objective total overflow) |

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod alliance;
mod denial;
mod donation;
mod vote;

pub use alliance::check_alliance;
pub use denial::{Decision, Denial};
pub use donation::check_donation;
pub use vote::check_vote;
