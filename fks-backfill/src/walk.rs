//! The chunked historical walk: for each enabled asset
//! and tracked interval, fetch one bounded chunk, validate it, persist
//! it, and advance the cursor — repeating no more often than
//! `rate_delay_sec` until `target_end` is reached, at which point the
//! dataset splits are materialized.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use fks_manager::MultiProviderManager;
use fks_quality::freshness::frequency_seconds;
use fks_store::{compute_time_splits, materialize_splits, OhlcvStore};
use fks_types::config::BackfillConfig;
use fks_types::{ActiveAsset, FetchRequest, FksError, MarketBar, NormalizedRow};

use crate::store::BackfillStore;

/// Chunk width for one walk step: 1 day for
/// sub-hourly intervals, 7 days for `1h`/`4h`, 30 days for `1d` and
/// coarser.
#[must_use]
pub fn chunk_for(interval: &str) -> Duration {
    match interval {
        "1h" | "4h" => Duration::days(7),
        "1d" | "1w" => Duration::days(30),
        _ => Duration::days(1),
    }
}

/// Fraction of expected rows missing from `bars` over `[start, end)` at
/// `interval`'s sampling frequency. Unrecognized intervals are treated as
/// always valid (no expectation to violate).
#[must_use]
pub fn missing_pct(bars: &[MarketBar], interval: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let Some(freq) = frequency_seconds(interval) else {
        return 0.0;
    };
    let span = (end - start).num_seconds().max(0);
    let expected = (span / freq.max(1)).max(1);
    let missing = (expected - bars.len() as i64).max(0);
    missing as f64 / expected as f64
}

/// Outcome of one chunk step, for logging/admin surfaces.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    /// Asset/interval this chunk advanced.
    pub asset_id: i64,
    /// Interval label.
    pub interval: String,
    /// Chunk's start/end boundary.
    pub start: DateTime<Utc>,
    /// Chunk's start/end boundary.
    pub end: DateTime<Utc>,
    /// Rows fetched in this chunk.
    pub rows: usize,
    /// Whether the chunk passed the `missing_pct` validity check and was
    /// written to the CSV/database.
    pub written: bool,
    /// Whether this step completed the walk for `(asset, interval)`.
    pub completed: bool,
}

/// Run one chunk for `(asset, interval)`: resolve progress (seeding it if
/// absent), fetch `[start, end)`, validate, persist, advance the cursor,
/// and materialize splits if the walk has reached `target_end`.
///
/// # Errors
/// Returns `FksError` if progress bookkeeping, the fetch, or persistence
/// fails. A chunk that fails validity (`missing_pct` too high) is not an
/// error: the cursor still advances and `written` is `false`.
#[allow(clippy::too_many_arguments)]
pub async fn run_chunk(
    backfill_store: &BackfillStore,
    manager: &MultiProviderManager,
    ohlcv_store: &OhlcvStore,
    csv_base_dir: &std::path::Path,
    asset: &ActiveAsset,
    interval: &str,
    cfg: &BackfillConfig,
) -> Result<Option<ChunkOutcome>, FksError> {
    let target_end = Utc::now();
    let target_start = target_end - Duration::days(i64::from(asset.target_history_years()) * 365);
    backfill_store.seed_progress(asset.id, interval, target_start, target_end)?;
    let progress = backfill_store
        .get_progress(asset.id, interval)?
        .ok_or_else(|| FksError::Persistence("progress missing after seed".to_string()))?;

    if progress.is_complete() {
        return Ok(None);
    }

    let chunk = chunk_for(interval);
    let start = progress.last_cursor;
    let end = (start + chunk).min(progress.target_end);

    let request = FetchRequest {
        symbol: asset.symbol.clone(),
        interval: interval.to_string(),
        start: Some(start.timestamp()),
        end: Some(end.timestamp()),
        limit: None,
    };
    let result = manager.fetch(&request).await?;
    let bars: Vec<MarketBar> = result
        .data
        .into_iter()
        .filter_map(|row| match row {
            NormalizedRow::Bar(b) => Some(b),
            _ => None,
        })
        .collect();

    let missing = missing_pct(&bars, interval, start, end);
    let written = missing <= cfg.max_missing_pct;
    if written && !bars.is_empty() {
        let csv_path = fks_store::managed_csv_path(csv_base_dir, &asset.source, &asset.symbol, interval);
        fks_store::append_csv(&csv_path, &bars)?;
        ohlcv_store
            .upsert_ohlcv(&asset.source, &asset.symbol, interval, &bars)
            .await?;
    } else if !written {
        #[cfg(feature = "tracing")]
        tracing::warn!(symbol = %asset.symbol, interval, missing_pct = missing, "chunk rejected, cursor still advances");
    }

    backfill_store.advance_cursor(asset.id, interval, end, bars.len() as u64)?;

    let completed = end >= progress.target_end;
    if completed {
        materialize_all_splits(backfill_store, ohlcv_store, asset, interval).await?;
    }

    Ok(Some(ChunkOutcome {
        asset_id: asset.id,
        interval: interval.to_string(),
        start,
        end,
        rows: bars.len(),
        written,
        completed,
    }))
}

async fn materialize_all_splits(
    backfill_store: &BackfillStore,
    ohlcv_store: &OhlcvStore,
    asset: &ActiveAsset,
    interval: &str,
) -> Result<(), FksError> {
    let progress = backfill_store
        .get_progress(asset.id, interval)?
        .ok_or_else(|| FksError::Persistence("progress missing at completion".to_string()))?;
    let bars = ohlcv_store
        .fetch_range(
            &asset.source,
            &asset.symbol,
            interval,
            progress.target_start.timestamp(),
            progress.target_end.timestamp(),
        )
        .await?;
    let timestamps: Vec<i64> = bars.iter().map(|b| b.ts).collect();
    let splits = compute_time_splits(&timestamps);
    materialize_splits(ohlcv_store.pool(), &asset.source, &asset.symbol, interval, &splits).await
}

/// Drive the walk forever: one full pass over every enabled asset's
/// tracked intervals, sleeping `cfg.rate_delay` between chunk steps.
/// Intended to be spawned as a background task.
pub async fn run_forever(
    backfill_store: &BackfillStore,
    manager: &MultiProviderManager,
    ohlcv_store: &OhlcvStore,
    csv_base_dir: &std::path::Path,
    cfg: &BackfillConfig,
) -> ! {
    loop {
        let assets = match backfill_store.list_enabled() {
            Ok(a) => a,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "failed to list enabled assets, retrying after delay");
                tokio::time::sleep(rate_delay_std(cfg)).await;
                continue;
            }
        };
        for asset in &assets {
            for interval in &asset.intervals {
                if let Err(_e) =
                    run_chunk(backfill_store, manager, ohlcv_store, csv_base_dir, asset, interval, cfg).await
                {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(symbol = %asset.symbol, interval, error = %_e, "backfill chunk failed");
                }
                tokio::time::sleep(rate_delay_std(cfg)).await;
            }
        }
    }
}

fn rate_delay_std(cfg: &BackfillConfig) -> StdDuration {
    cfg.rate_delay
}
