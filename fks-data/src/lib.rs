//! fks-data
//!
//! The top-level service: wires every other `fks-*` crate into one process. `main.rs`
//! is deliberately thin — it loads configuration, calls [`bootstrap::build`],
//! spawns the background loops, and serves the router.
#![warn(missing_docs)]

pub mod bootstrap;
pub mod config;
pub mod rest;
pub mod state;
pub mod webhook;

pub use bootstrap::{build, Bootstrapped};
pub use config::AppConfig;
pub use state::AppState;
