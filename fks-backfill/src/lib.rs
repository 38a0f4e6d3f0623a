//! fks-backfill
//!
//! The backfill engine: the tracked-asset/cursor registry
//! (`fks_backfill::store`), the chunked historical walk loop
//! (`fks_backfill::walk`) that fetches bounded chunks via the
//! multi-provider manager, validates them, writes them to the managed
//! CSV layout and the idempotent OHLCV store, and materializes dataset
//! splits once a `(asset, interval)` pair reaches its target horizon.
//!
//! Provider API key persistence reuses [`fks_core::auth::KeyStore`]
//! directly; this crate adds no key-management code of its own.
#![warn(missing_docs)]

pub mod store;
pub mod walk;

pub use store::BackfillStore;
pub use walk::{chunk_for, missing_pct, run_chunk, run_forever, ChunkOutcome};
