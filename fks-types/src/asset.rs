use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A tracked asset registered for continuous backfill.
///
/// Lifecycle: created via the admin API; mutated only by enable/disable or
/// removal. The ingest collector never mutates this row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAsset {
    /// Stable identifier (row id in the backfill store).
    pub id: i64,
    /// Data source/provider key this asset is tracked under.
    pub source: String,
    /// Canonical instrument symbol.
    pub symbol: String,
    /// Intervals tracked for this asset (e.g. `{"1h", "1d"}`).
    pub intervals: BTreeSet<String>,
    /// Asset class hint (defaults to `"crypto"`).
    pub asset_type: Option<String>,
    /// Exchange hint, when relevant to the provider.
    pub exchange: Option<String>,
    /// Bounded history horizon in years; `None` when `full_history` is set.
    pub years: Option<u32>,
    /// Whether to backfill the provider's full available history.
    pub full_history: bool,
    /// Whether the backfill loop should process this asset.
    pub enabled: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-mutated timestamp.
    pub updated_at: DateTime<Utc>,
}

impl ActiveAsset {
    /// Number of years of history to target: `years` when bounded, or the
    /// 20-year horizon conventionally used for "full history" requests
    /// (the provider clamps further if its own horizon is shorter).
    #[must_use]
    pub fn target_history_years(&self) -> u32 {
        if self.full_history {
            20
        } else {
            self.years.unwrap_or(1)
        }
    }
}

/// Per-`(asset, interval)` backfill cursor state.
///
/// The cursor advances monotonically toward `target_end` and never
/// decreases, even on chunks that return no rows (this prevents permanent
/// stalls).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackfillProgress {
    /// Current walk position; the next chunk starts here.
    pub last_cursor: DateTime<Utc>,
    /// Earliest instant the walk targets.
    pub target_start: DateTime<Utc>,
    /// Latest instant the walk targets (typically "now" at creation time).
    pub target_end: DateTime<Utc>,
    /// Row count returned by the most recent chunk fetch.
    pub last_rows: u64,
    /// When the most recent chunk was processed.
    pub last_run: DateTime<Utc>,
}

impl BackfillProgress {
    /// Whether the cursor has reached (or passed) `target_end`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.last_cursor >= self.target_end
    }
}

/// Per-provider health tracked exclusively by the multi-provider manager.
///
/// Never persisted; reconstructed fresh at manager initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider/connector name.
    pub name: String,
    /// Consecutive failure count since the last success.
    pub failures: u32,
    /// Timestamp of the most recent failure, if any.
    pub last_failure: Option<DateTime<Utc>>,
    /// Timestamp of the most recent success, if any.
    pub last_success: Option<DateTime<Utc>>,
    /// Whether the circuit breaker is currently open.
    pub circuit_open: bool,
    /// When the circuit was opened, if it is currently open.
    pub circuit_open_at: Option<DateTime<Utc>>,
    /// Latency of the most recent successful call, for `/health` reporting
    /// only; never consulted for routing decisions.
    pub last_latency_ms: Option<u64>,
}

impl ProviderHealth {
    /// A freshly initialized, healthy record for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: 0,
            last_failure: None,
            last_success: None,
            circuit_open: false,
            circuit_open_at: None,
            last_latency_ms: None,
        }
    }
}
