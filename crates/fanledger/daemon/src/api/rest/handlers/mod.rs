//! API request handlers

mod actions;
mod admin;
mod health;
mod views;

pub use actions::*;
pub use admin::*;
pub use health::*;
pub use views::*;
