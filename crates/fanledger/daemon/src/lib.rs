//! Fanledger daemon library
//!
//! This module provides the components of the `fanledgerd` binary:
//! - JSON API handlers over the ledger facade
//! - Configuration loading
//! - Storage backend selection and server lifecycle

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
