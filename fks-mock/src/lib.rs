//! fks-mock
//!
//! Deterministic fixture adapters and fixture payloads for every row
//! family (bar, quote, series, futures event), so `fks-manager`,
//! `fks-scheduler`, `fks-backfill`, and `fks-ws` can be exercised in tests
//! without network access. Two flavors are provided: a static,
//! fixture-backed [`StaticMockFetcher`] honoring the `FAIL`/`TIMEOUT`
//! symbol conventions, and a [`dynamic::DynamicMockFetcher`] whose
//! behavior is scripted per-symbol from an external controller.
#![warn(missing_docs)]

pub mod dynamic;
pub mod fixtures;
mod static_fetcher;

pub use static_fetcher::{RowFamily, StaticMockFetcher};
