//! fks-manager
//!
//! Multi-provider orchestration: priority-ordered failover across
//! provider adapters, a per-provider circuit breaker, and an optional
//! cross-source verification step before a result is accepted.
#![warn(missing_docs)]

pub mod circuit;
pub mod manager;

pub use circuit::CircuitState;
pub use manager::{failure_counts, latest_close, Fetcher, MultiProviderManager};
