//! The backfill store: `ActiveAsset` and
//! `BackfillProgress` persisted in a local embedded SQLite database.
//! Writes are serialized behind a `Mutex`-guarded connection, matching
//! the rule that the active-asset store serializes writes via a file/DB
//! lock; readers go through the same guard since `rusqlite::Connection`
//! is not `Sync`.

use std::collections::BTreeSet;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fks_types::{ActiveAsset, BackfillProgress, FksError};
use rusqlite::{params, Connection, OptionalExtension};

/// Embedded SQLite-backed repository for tracked assets and their
/// per-interval backfill cursors.
pub struct BackfillStore {
    conn: Mutex<Connection>,
}

impl BackfillStore {
    /// Open (creating if absent) a backfill store at `path` and ensure its
    /// schema exists.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` if the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, FksError> {
        let conn = Connection::open(path)
            .map_err(|e| FksError::Persistence(format!("backfill store open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open an in-memory store, for tests and ephemeral runs.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, FksError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FksError::Persistence(format!("backfill store open: {e}")))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS active_assets (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                source       TEXT NOT NULL,
                symbol       TEXT NOT NULL,
                intervals    TEXT NOT NULL,
                asset_type   TEXT,
                exchange     TEXT,
                years        INTEGER,
                full_history INTEGER NOT NULL DEFAULT 0,
                enabled      INTEGER NOT NULL DEFAULT 1,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                UNIQUE(source, symbol)
            );
            CREATE TABLE IF NOT EXISTS backfill_progress (
                asset_id     INTEGER NOT NULL,
                interval     TEXT NOT NULL,
                last_cursor  TEXT NOT NULL,
                target_start TEXT NOT NULL,
                target_end   TEXT NOT NULL,
                last_rows    INTEGER NOT NULL DEFAULT 0,
                last_run     TEXT NOT NULL,
                PRIMARY KEY (asset_id, interval)
            );
            ",
        )
        .map_err(|e| FksError::Persistence(format!("backfill store schema: {e}")))?;
        Ok(())
    }

    /// Register a new tracked asset. Returns the
    /// assigned row id.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a write failure, including a
    /// duplicate `(source, symbol)`.
    pub fn register_asset(
        &self,
        source: &str,
        symbol: &str,
        intervals: &BTreeSet<String>,
        asset_type: Option<&str>,
        exchange: Option<&str>,
        years: Option<u32>,
        full_history: bool,
    ) -> Result<i64, FksError> {
        let now = Utc::now();
        let intervals_json = serde_json::to_string(intervals)
            .map_err(|e| FksError::Persistence(format!("serialize intervals: {e}")))?;
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.execute(
            r"INSERT INTO active_assets
                (source, symbol, intervals, asset_type, exchange, years, full_history, enabled, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
            params![
                source,
                symbol,
                intervals_json,
                asset_type,
                exchange,
                years,
                i64::from(full_history),
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| FksError::Persistence(format!("register_asset: {e}")))?;
        Ok(conn.last_insert_rowid())
    }

    /// Enable or disable a tracked asset. Never mutates any other field.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a write failure.
    pub fn set_enabled(&self, asset_id: i64, enabled: bool) -> Result<(), FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.execute(
            "UPDATE active_assets SET enabled = ?1, updated_at = ?2 WHERE id = ?3",
            params![i64::from(enabled), Utc::now().to_rfc3339(), asset_id],
        )
        .map_err(|e| FksError::Persistence(format!("set_enabled: {e}")))?;
        Ok(())
    }

    /// Every enabled tracked asset, in ascending id order.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a query failure.
    pub fn list_enabled(&self) -> Result<Vec<ActiveAsset>, FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT id, source, symbol, intervals, asset_type, exchange, years,
                        full_history, enabled, created_at, updated_at
                 FROM active_assets WHERE enabled = 1 ORDER BY id ASC",
            )
            .map_err(|e| FksError::Persistence(format!("list_enabled prepare: {e}")))?;
        let rows = stmt
            .query_map([], row_to_asset)
            .map_err(|e| FksError::Persistence(format!("list_enabled query: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| FksError::Persistence(format!("list_enabled rows: {e}")))
    }

    /// Current progress cursor for `(asset_id, interval)`, or `None` if the
    /// walk has not started yet.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a query failure.
    pub fn get_progress(
        &self,
        asset_id: i64,
        interval: &str,
    ) -> Result<Option<BackfillProgress>, FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.query_row(
            "SELECT last_cursor, target_start, target_end, last_rows, last_run
             FROM backfill_progress WHERE asset_id = ?1 AND interval = ?2",
            params![asset_id, interval],
            row_to_progress,
        )
        .optional()
        .map_err(|e| FksError::Persistence(format!("get_progress: {e}")))
    }

    /// Seed a fresh progress row for `(asset_id, interval)`, targeting
    /// `[target_start, target_end]`. No-op if a row already exists.
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a write failure.
    pub fn seed_progress(
        &self,
        asset_id: i64,
        interval: &str,
        target_start: DateTime<Utc>,
        target_end: DateTime<Utc>,
    ) -> Result<(), FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.execute(
            r"INSERT OR IGNORE INTO backfill_progress
                (asset_id, interval, last_cursor, target_start, target_end, last_rows, last_run)
              VALUES (?1, ?2, ?3, ?3, ?4, 0, ?3)",
            params![
                asset_id,
                interval,
                target_start.to_rfc3339(),
                target_end.to_rfc3339(),
            ],
        )
        .map_err(|e| FksError::Persistence(format!("seed_progress: {e}")))?;
        Ok(())
    }

    /// Advance the cursor to `new_cursor`, recording `rows` fetched in this
    /// chunk. The cursor never decreases: a `new_cursor` behind the stored
    /// value is ignored (last-write-wins would otherwise let a racing
    /// stale writer roll the walk backward).
    ///
    /// # Errors
    /// Returns `FksError::Persistence` on a write failure.
    pub fn advance_cursor(
        &self,
        asset_id: i64,
        interval: &str,
        new_cursor: DateTime<Utc>,
        rows: u64,
    ) -> Result<(), FksError> {
        let conn = self.conn.lock().expect("backfill store mutex poisoned");
        conn.execute(
            r"UPDATE backfill_progress
              SET last_cursor = ?1, last_rows = ?2, last_run = ?3
              WHERE asset_id = ?4 AND interval = ?5
                AND datetime(?1) >= datetime(last_cursor)",
            params![
                new_cursor.to_rfc3339(),
                rows,
                Utc::now().to_rfc3339(),
                asset_id,
                interval,
            ],
        )
        .map_err(|e| FksError::Persistence(format!("advance_cursor: {e}")))?;
        Ok(())
    }
}

fn row_to_asset(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActiveAsset> {
    let intervals_json: String = row.get(3)?;
    let intervals: BTreeSet<String> = serde_json::from_str(&intervals_json).unwrap_or_default();
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(ActiveAsset {
        id: row.get(0)?,
        source: row.get(1)?,
        symbol: row.get(2)?,
        intervals,
        asset_type: row.get(4)?,
        exchange: row.get(5)?,
        years: row.get::<_, Option<i64>>(6)?.map(|v| v as u32),
        full_history: row.get::<_, i64>(7)? != 0,
        enabled: row.get::<_, i64>(8)? != 0,
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn row_to_progress(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackfillProgress> {
    let last_cursor: String = row.get(0)?;
    let target_start: String = row.get(1)?;
    let target_end: String = row.get(2)?;
    let last_run: String = row.get(4)?;
    Ok(BackfillProgress {
        last_cursor: parse_rfc3339(&last_cursor),
        target_start: parse_rfc3339(&target_start),
        target_end: parse_rfc3339(&target_end),
        last_rows: row.get::<_, i64>(3)? as u64,
        last_run: parse_rfc3339(&last_run),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
