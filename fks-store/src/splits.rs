//! Dataset split materialization: time-based 80/10/10 train/val/test
//! boundaries over a sorted timestamp series, upserted as boundary rows.

use chrono::{DateTime, Utc};
use fks_types::FksError;
use sqlx::PgPool;

/// Which contiguous slice of a time range a split boundary covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// The earliest 80% of the range.
    Train,
    /// The next 10%.
    Val,
    /// The final 10%.
    Test,
}

impl SplitKind {
    /// The lowercase label persisted in `dataset_splits.split`.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
            Self::Test => "test",
        }
    }
}

/// One split's inclusive `[start_ts, end_ts]` boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitBoundary {
    /// Which split this boundary belongs to.
    pub kind: SplitKind,
    /// Inclusive start, UTC seconds.
    pub start_ts: i64,
    /// Inclusive end, UTC seconds.
    pub end_ts: i64,
    /// Row count covered by this split.
    pub row_count: usize,
}

/// Compute time-based 80/10/10 train/val/test splits over a
/// sorted-ascending `timestamps` series.
///
/// Returns three contiguous, non-overlapping ranges whose combined row
/// count equals `timestamps.len()`. Returns an empty `Vec` for an empty
/// input (no boundaries to materialize).
#[must_use]
pub fn compute_time_splits(timestamps: &[i64]) -> Vec<SplitBoundary> {
    let n = timestamps.len();
    if n == 0 {
        return Vec::new();
    }
    let train_end = (n as f64 * 0.8).round() as usize;
    let val_end = (n as f64 * 0.9).round() as usize;
    // Guarantee monotonic, non-overlapping, exhaustive partitioning even at
    // tiny `n` where rounding could otherwise let a boundary slip backward.
    let train_end = train_end.clamp(0, n);
    let val_end = val_end.clamp(train_end, n);

    let mut out = Vec::with_capacity(3);
    if train_end > 0 {
        out.push(SplitBoundary {
            kind: SplitKind::Train,
            start_ts: timestamps[0],
            end_ts: timestamps[train_end - 1],
            row_count: train_end,
        });
    }
    if val_end > train_end {
        out.push(SplitBoundary {
            kind: SplitKind::Val,
            start_ts: timestamps[train_end],
            end_ts: timestamps[val_end - 1],
            row_count: val_end - train_end,
        });
    }
    if n > val_end {
        out.push(SplitBoundary {
            kind: SplitKind::Test,
            start_ts: timestamps[val_end],
            end_ts: timestamps[n - 1],
            row_count: n - val_end,
        });
    }
    out
}

/// Upsert split boundaries for `(source, symbol, interval)` into
/// `dataset_splits`.
///
/// # Errors
/// Returns `FksError::Persistence` on a write failure.
pub async fn materialize_splits(
    pool: &PgPool,
    source: &str,
    symbol: &str,
    interval: &str,
    splits: &[SplitBoundary],
) -> Result<(), FksError> {
    for split in splits {
        let start = DateTime::<Utc>::from_timestamp(split.start_ts, 0)
            .ok_or_else(|| FksError::InvalidArg(format!("invalid start_ts {}", split.start_ts)))?;
        let end = DateTime::<Utc>::from_timestamp(split.end_ts, 0)
            .ok_or_else(|| FksError::InvalidArg(format!("invalid end_ts {}", split.end_ts)))?;
        sqlx::query(
            r"
            INSERT INTO dataset_splits (source, symbol, interval, split, start_ts, end_ts)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (source, symbol, interval, split)
            DO UPDATE SET start_ts = EXCLUDED.start_ts, end_ts = EXCLUDED.end_ts
            ",
        )
        .bind(source)
        .bind(symbol)
        .bind(interval)
        .bind(split.kind.label())
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .map_err(|e| FksError::Persistence(format!("materialize_splits: {e}")))?;
    }
    #[cfg(feature = "tracing")]
    tracing::info!(source, symbol, interval, splits = splits.len(), "materialized dataset splits");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_partition_exhaustively_and_in_order() {
        let timestamps: Vec<i64> = (0..100).map(|i| i * 60).collect();
        let splits = compute_time_splits(&timestamps);
        assert_eq!(splits.len(), 3);
        let total: usize = splits.iter().map(|s| s.row_count).sum();
        assert_eq!(total, 100);
        assert_eq!(splits[0].kind, SplitKind::Train);
        assert_eq!(splits[0].row_count, 80);
        assert_eq!(splits[1].kind, SplitKind::Val);
        assert_eq!(splits[1].row_count, 10);
        assert_eq!(splits[2].kind, SplitKind::Test);
        assert_eq!(splits[2].row_count, 10);
        // Contiguous: each split's start follows the previous one's end.
        assert_eq!(splits[0].end_ts + 60, splits[1].start_ts);
        assert_eq!(splits[1].end_ts + 60, splits[2].start_ts);
    }

    #[test]
    fn empty_series_yields_no_boundaries() {
        assert!(compute_time_splits(&[]).is_empty());
    }

    #[test]
    fn tiny_series_still_partitions_exhaustively() {
        for n in 1..10 {
            let timestamps: Vec<i64> = (0..n).map(|i| i * 60).collect();
            let splits = compute_time_splits(&timestamps);
            let total: usize = splits.iter().map(|s| s.row_count).sum();
            assert_eq!(total, n as usize, "n={n}");
            // Non-overlapping: kinds appear in train, val, test order.
            let kinds: Vec<SplitKind> = splits.iter().map(|s| s.kind).collect();
            let mut sorted = kinds.clone();
            sorted.sort_by_key(|k| match k {
                SplitKind::Train => 0,
                SplitKind::Val => 1,
                SplitKind::Test => 2,
            });
            assert_eq!(kinds, sorted, "n={n}");
        }
    }

    #[test]
    fn single_row_goes_entirely_to_train() {
        let splits = compute_time_splits(&[100]);
        assert_eq!(splits.len(), 1);
        assert_eq!(splits[0].kind, SplitKind::Train);
        assert_eq!(splits[0].row_count, 1);
    }
}
