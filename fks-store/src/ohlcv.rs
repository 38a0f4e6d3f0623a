//! Idempotent OHLCV persistence: batched upsert keyed by `(source,
//! symbol, interval, ts)`, plus sorted range and latest-bar queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fks_types::{FksError, MarketBar};
use sqlx::PgPool;

/// The write side of [`OhlcvStore`] that callers (the scheduler, the
/// backfill walk) depend on, so tests can fake persistence without a live
/// `PgPool`.
#[async_trait]
pub trait OhlcvSink: Send + Sync {
    /// See [`OhlcvStore::upsert_ohlcv`].
    async fn upsert_ohlcv(
        &self,
        source: &str,
        symbol: &str,
        interval: &str,
        rows: &[MarketBar],
    ) -> Result<u64, FksError>;
}

/// Postgres-backed store for the `ohlcv` and `dataset_splits` tables.
#[derive(Clone)]
pub struct OhlcvStore {
    pool: PgPool,
}

impl OhlcvStore {
    /// Wrap an existing pool. Callers should run
    /// [`crate::schema::ensure_schema`] once at startup before use.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for components (migrations, splits) that share
    /// the connection.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Batched `INSERT ... ON CONFLICT (source, symbol, interval, ts) DO
    /// UPDATE` for every bar in `rows`. Persisting the same bar once or `k`
    /// times yields the same final row: the last write's OHLCV fields win.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on any write failure. The collector
    /// task that calls this is expected to retry via the worker's own
    /// backoff policy.
    pub async fn upsert_ohlcv(
        &self,
        source: &str,
        symbol: &str,
        interval: &str,
        rows: &[MarketBar],
    ) -> Result<u64, FksError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| FksError::Persistence(format!("upsert_ohlcv begin: {e}")))?;
        for bar in rows {
            let ts = DateTime::<Utc>::from_timestamp(bar.ts, 0)
                .ok_or_else(|| FksError::InvalidArg(format!("invalid ts {}", bar.ts)))?;
            sqlx::query(
                r"
                INSERT INTO ohlcv (source, symbol, interval, ts, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (source, symbol, interval, ts)
                DO UPDATE SET open = EXCLUDED.open,
                              high = EXCLUDED.high,
                              low = EXCLUDED.low,
                              close = EXCLUDED.close,
                              volume = EXCLUDED.volume
                ",
            )
            .bind(source)
            .bind(symbol)
            .bind(interval)
            .bind(ts)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await
            .map_err(|e| FksError::Persistence(format!("upsert_ohlcv: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| FksError::Persistence(format!("upsert_ohlcv commit: {e}")))?;
        #[cfg(feature = "tracing")]
        tracing::debug!(source, symbol, interval, rows = rows.len(), "upserted ohlcv rows");
        Ok(rows.len() as u64)
    }

    /// Rows in `[start_ts, end_ts]` inclusive, sorted ascending by `ts`.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a query failure.
    pub async fn fetch_range(
        &self,
        source: &str,
        symbol: &str,
        interval: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<MarketBar>, FksError> {
        let start = DateTime::<Utc>::from_timestamp(start_ts, 0)
            .ok_or_else(|| FksError::InvalidArg(format!("invalid start_ts {start_ts}")))?;
        let end = DateTime::<Utc>::from_timestamp(end_ts, 0)
            .ok_or_else(|| FksError::InvalidArg(format!("invalid end_ts {end_ts}")))?;
        let rows = sqlx::query_as::<_, OhlcvRow>(
            r"
            SELECT ts, open, high, low, close, volume FROM ohlcv
            WHERE source = $1 AND symbol = $2 AND interval = $3 AND ts BETWEEN $4 AND $5
            ORDER BY ts ASC
            ",
        )
        .bind(source)
        .bind(symbol)
        .bind(interval)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FksError::Persistence(format!("fetch_range: {e}")))?;
        Ok(rows.into_iter().map(OhlcvRow::into_bar).collect())
    }

    /// The most recent bar for `(source, symbol, interval)`, or `None` if
    /// no rows exist.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a query failure.
    pub async fn latest(
        &self,
        source: &str,
        symbol: &str,
        interval: &str,
    ) -> Result<Option<MarketBar>, FksError> {
        let row = sqlx::query_as::<_, OhlcvRow>(
            r"
            SELECT ts, open, high, low, close, volume FROM ohlcv
            WHERE source = $1 AND symbol = $2 AND interval = $3
            ORDER BY ts DESC LIMIT 1
            ",
        )
        .bind(source)
        .bind(symbol)
        .bind(interval)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FksError::Persistence(format!("latest: {e}")))?;
        Ok(row.map(OhlcvRow::into_bar))
    }
}

#[async_trait]
impl OhlcvSink for OhlcvStore {
    async fn upsert_ohlcv(
        &self,
        source: &str,
        symbol: &str,
        interval: &str,
        rows: &[MarketBar],
    ) -> Result<u64, FksError> {
        OhlcvStore::upsert_ohlcv(self, source, symbol, interval, rows).await
    }
}

#[derive(sqlx::FromRow)]
struct OhlcvRow {
    ts: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl OhlcvRow {
    fn into_bar(self) -> MarketBar {
        MarketBar {
            ts: self.ts.timestamp(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}
