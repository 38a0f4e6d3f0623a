//! fks-store
//!
//! Persistence: idempotent OHLCV upserts, dataset-split
//! materialization, fetch/range and latest queries, the checksummed
//! migration runner, managed CSV file output, tick-level
//! persistence, and a non-blocking sink for composite quality scores.
#![warn(missing_docs)]

pub mod csv_store;
pub mod migrations;
pub mod ohlcv;
pub mod quality_sink;
pub mod schema;
pub mod splits;
pub mod tick;

pub use csv_store::{append_csv, managed_csv_path, safe_symbol, split_csv_path, write_split_csv};
pub use migrations::{run_migrations, sha256_hex, MigrationFile};
pub use ohlcv::{OhlcvSink, OhlcvStore};
pub use quality_sink::{spawn_writer, ChannelQualityScoreSink};
pub use schema::{ensure_schema, try_create_hypertable};
pub use splits::{compute_time_splits, materialize_splits, SplitBoundary, SplitKind};
pub use tick::{insert_tick, TickDataRow};
