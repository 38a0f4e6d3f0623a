//! Idempotent DDL for every persisted table. `ensure_schema`
//! is safe to run on every startup: every statement is `CREATE ... IF NOT
//! EXISTS`, so a warm database is a no-op.
//!
//! The `ohlcv` table is the canonical time-series hypertable; when the
//! running Postgres carries the TimescaleDB
//! extension, `create_hypertable` (called separately, see
//! [`try_create_hypertable`]) partitions it by time. Absent the extension,
//! it behaves as a plain table keyed by `(source, symbol, interval, ts)`.

use fks_types::FksError;
use sqlx::PgPool;

const OHLCV_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS ohlcv (
    source   TEXT NOT NULL,
    symbol   TEXT NOT NULL,
    interval TEXT NOT NULL,
    ts       TIMESTAMPTZ NOT NULL,
    open     DOUBLE PRECISION NOT NULL,
    high     DOUBLE PRECISION NOT NULL,
    low      DOUBLE PRECISION NOT NULL,
    close    DOUBLE PRECISION NOT NULL,
    volume   DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (source, symbol, interval, ts)
)";

const DATASET_SPLITS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS dataset_splits (
    source     TEXT NOT NULL,
    symbol     TEXT NOT NULL,
    interval   TEXT NOT NULL,
    split      TEXT NOT NULL,
    start_ts   TIMESTAMPTZ NOT NULL,
    end_ts     TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (source, symbol, interval, split)
)";

const SCHEMA_MIGRATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    filename   TEXT PRIMARY KEY,
    checksum   TEXT NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const TICK_DATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS tick_data (
    time             TIMESTAMPTZ NOT NULL,
    symbol           TEXT NOT NULL,
    exchange         TEXT NOT NULL,
    bid              DOUBLE PRECISION,
    ask              DOUBLE PRECISION,
    last             DOUBLE PRECISION NOT NULL,
    volume           DOUBLE PRECISION NOT NULL,
    spread           DOUBLE PRECISION,
    price_delta      DOUBLE PRECISION,
    delta_pct        DOUBLE PRECISION,
    direction        SMALLINT,
    is_micro_change  BOOLEAN NOT NULL DEFAULT false,
    binary_value     VARCHAR(1),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const BTR_STATES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS btr_states (
    symbol          TEXT NOT NULL,
    exchange        TEXT NOT NULL,
    time            TIMESTAMPTZ NOT NULL,
    state_sequence  VARCHAR(64) NOT NULL,
    depth           SMALLINT NOT NULL,
    next_move_prob  DECIMAL(6,4),
    prediction      VARCHAR(10),
    PRIMARY KEY (symbol, exchange, time)
)";

const QUALITY_SCORES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS quality_scores (
    time               TIMESTAMPTZ NOT NULL,
    symbol             TEXT NOT NULL,
    overall            DOUBLE PRECISION NOT NULL,
    status             TEXT NOT NULL,
    component_scores   JSONB NOT NULL,
    issues             JSONB NOT NULL,
    issue_count        INTEGER NOT NULL,
    check_duration_ms  DOUBLE PRECISION NOT NULL,
    PRIMARY KEY (time, symbol)
)";

/// Create every table this crate owns, in dependency order. Idempotent.
///
/// # Errors
/// Returns `FksError::Persistence` if any `CREATE TABLE` statement fails.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), FksError> {
    for ddl in [
        SCHEMA_MIGRATIONS_TABLE,
        OHLCV_TABLE,
        DATASET_SPLITS_TABLE,
        TICK_DATA_TABLE,
        BTR_STATES_TABLE,
        QUALITY_SCORES_TABLE,
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| FksError::Persistence(format!("ensure_schema: {e}")))?;
    }
    #[cfg(feature = "tracing")]
    tracing::info!("schema ensured");
    Ok(())
}

/// Best-effort conversion of `ohlcv` into a TimescaleDB hypertable and
/// enabling compression on `tick_data`: partitioned by time when the
/// underlying engine supports it, and the
/// tick hypertable's 1-hour chunk interval with a same-day compression
/// policy. Silently no-ops (logs a warning) when TimescaleDB is absent,
/// since a plain Postgres table is still a correct, if unpartitioned,
/// backing store.
pub async fn try_create_hypertable(pool: &PgPool) {
    let statements = [
        "SELECT create_hypertable('ohlcv', 'ts', if_not_exists => true)",
        "SELECT create_hypertable('tick_data', 'time', chunk_time_interval => interval '1 hour', if_not_exists => true)",
        "ALTER TABLE tick_data SET (timescaledb.compress, timescaledb.compress_segmentby = 'exchange, symbol', timescaledb.compress_orderby = 'time DESC')",
        "SELECT add_compression_policy('tick_data', INTERVAL '1 day', if_not_exists => true)",
    ];
    for stmt in statements {
        if let Err(_e) = sqlx::query(stmt).execute(pool).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, "timescaledb extension unavailable, skipping hypertable setup");
        }
    }
}
