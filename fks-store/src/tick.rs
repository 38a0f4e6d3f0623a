//! Persistence for the `tick_data` hypertable: one row per scanned tick,
//! carrying the delta-scanner's direction/micro-change classification
//! alongside the raw quote.

use chrono::{DateTime, Utc};
use fks_types::FksError;
use sqlx::PgPool;

/// One row of the `tick_data` table.
#[derive(Debug, Clone)]
pub struct TickDataRow {
    /// UTC seconds since the epoch.
    pub time: i64,
    /// Instrument symbol.
    pub symbol: String,
    /// Exchange/venue name.
    pub exchange: String,
    /// Best bid, if known.
    pub bid: Option<f64>,
    /// Best ask, if known.
    pub ask: Option<f64>,
    /// Last traded/quoted price.
    pub last: f64,
    /// Traded volume associated with this tick.
    pub volume: f64,
    /// `ask - bid`, if both sides are known.
    pub spread: Option<f64>,
    /// `price - prev_price`, from the delta scanner.
    pub price_delta: Option<f64>,
    /// `100 * price_delta / prev_price`, from the delta scanner.
    pub delta_pct: Option<f64>,
    /// `1` up, `-1` down, `0` neutral; `None` for the first tick.
    pub direction: Option<i16>,
    /// Whether the delta scanner classified this move as micro.
    pub is_micro_change: bool,
    /// `"1"`/`"0"` binary symbol, `None` for neutral moves.
    pub binary_value: Option<char>,
}

/// Insert one tick row. `tick_data` is append-only; there is no idempotent
/// key to upsert on (unlike `ohlcv`), since ticks are not retried the same
/// way bar fetches are.
///
/// # Errors
/// Returns `FksError::Persistence` on a write failure.
pub async fn insert_tick(pool: &PgPool, row: &TickDataRow) -> Result<(), FksError> {
    let time = DateTime::<Utc>::from_timestamp(row.time, 0)
        .ok_or_else(|| FksError::InvalidArg(format!("invalid tick time {}", row.time)))?;
    sqlx::query(
        r"
        INSERT INTO tick_data
            (time, symbol, exchange, bid, ask, last, volume, spread, price_delta,
             delta_pct, direction, is_micro_change, binary_value)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ",
    )
    .bind(time)
    .bind(&row.symbol)
    .bind(&row.exchange)
    .bind(row.bid)
    .bind(row.ask)
    .bind(row.last)
    .bind(row.volume)
    .bind(row.spread)
    .bind(row.price_delta)
    .bind(row.delta_pct)
    .bind(row.direction)
    .bind(row.is_micro_change)
    .bind(row.binary_value.map(String::from))
    .execute(pool)
    .await
    .map_err(|e| FksError::Persistence(format!("insert_tick: {e}")))?;
    Ok(())
}
