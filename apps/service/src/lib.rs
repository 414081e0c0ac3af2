//! uppe-checks - declarative health-check scheduler
//!
//! Runs external probe commands on independent schedules, tracks each
//! check's state from the probe's exit code and posts a notification on
//! every state change. A signed command endpoint allows on-demand runs.

pub mod config;
pub mod crypto;
pub mod monitoring;
pub mod notify;
pub mod server;

pub use config::Settings;
pub use monitoring::{Check, Scheduler};
