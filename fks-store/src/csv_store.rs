//! Managed CSV file layout: canonical per-asset CSVs under
//! `data/managed/<source>/<safe_symbol>/<safe_symbol>_<interval>.csv`,
//! deduplicated on the timestamp column, plus split CSVs under
//! `.../splits/<symbol>_<interval>_<train|val|test>.csv`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fks_types::{FksError, MarketBar};

use crate::splits::SplitKind;

/// Sanitize a symbol for use as a path component: anything other than
/// ASCII alphanumerics, `-`, and `_` becomes `_`.
#[must_use]
pub fn safe_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Path to the managed CSV for `(source, symbol, interval)` under `base_dir`
/// (conventionally `data/managed`).
#[must_use]
pub fn managed_csv_path(base_dir: &Path, source: &str, symbol: &str, interval: &str) -> PathBuf {
    let safe = safe_symbol(symbol);
    base_dir.join(source).join(&safe).join(format!("{safe}_{interval}.csv"))
}

/// Path to one split's CSV for `(source, symbol, interval, split)`.
#[must_use]
pub fn split_csv_path(
    base_dir: &Path,
    source: &str,
    symbol: &str,
    interval: &str,
    split: SplitKind,
) -> PathBuf {
    let safe = safe_symbol(symbol);
    base_dir
        .join(source)
        .join(&safe)
        .join("splits")
        .join(format!("{safe}_{interval}_{}.csv", split.label()))
}

#[derive(serde::Serialize, serde::Deserialize)]
struct CsvRow {
    ts: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<&MarketBar> for CsvRow {
    fn from(bar: &MarketBar) -> Self {
        Self { ts: bar.ts, open: bar.open, high: bar.high, low: bar.low, close: bar.close, volume: bar.volume }
    }
}

impl From<CsvRow> for MarketBar {
    fn from(row: CsvRow) -> Self {
        Self { ts: row.ts, open: row.open, high: row.high, low: row.low, close: row.close, volume: row.volume }
    }
}

fn read_existing(path: &Path) -> Result<BTreeMap<i64, MarketBar>, FksError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| FksError::Persistence(format!("open csv {}: {e}", path.display())))?;
    let mut out = BTreeMap::new();
    for record in reader.deserialize::<CsvRow>() {
        let row = record.map_err(|e| FksError::Persistence(format!("parse csv {}: {e}", path.display())))?;
        let bar: MarketBar = row.into();
        out.insert(bar.ts, bar);
    }
    Ok(out)
}

fn write_all(path: &Path, rows: &BTreeMap<i64, MarketBar>) -> Result<(), FksError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| FksError::Persistence(format!("mkdir {}: {e}", parent.display())))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| FksError::Persistence(format!("open csv for write {}: {e}", path.display())))?;
    for bar in rows.values() {
        writer
            .serialize(CsvRow::from(bar))
            .map_err(|e| FksError::Persistence(format!("write csv row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| FksError::Persistence(format!("flush csv {}: {e}", path.display())))?;
    Ok(())
}

/// Append `bars` to the managed CSV at `path`, deduplicating on the
/// timestamp column: a bar whose `ts` already exists overwrites the
/// existing row (last write wins), matching the upsert semantics of
/// [`crate::ohlcv::OhlcvStore::upsert_ohlcv`]. The file is always rewritten
/// sorted ascending by `ts`.
///
/// # Errors
/// Returns `FksError::Persistence` on any I/O or parse failure.
pub fn append_csv(path: &Path, bars: &[MarketBar]) -> Result<(), FksError> {
    let mut rows = read_existing(path)?;
    for bar in bars {
        rows.insert(bar.ts, *bar);
    }
    write_all(path, &rows)
}

/// Write a split's bars to its dedicated CSV, overwriting any existing
/// file (splits are materialized once per completed backfill range, not
/// incrementally appended).
///
/// # Errors
/// Returns `FksError::Persistence` on any I/O failure.
pub fn write_split_csv(path: &Path, bars: &[MarketBar]) -> Result<(), FksError> {
    let rows: BTreeMap<i64, MarketBar> = bars.iter().map(|b| (b.ts, *b)).collect();
    write_all(path, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64) -> MarketBar {
        MarketBar { ts, open: 1.0, high: 1.0, low: 1.0, close: 1.0, volume: 1.0 }
    }

    fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("fks-csv-test-{}-{name}.csv", std::process::id()))
    }

    #[test]
    fn safe_symbol_replaces_path_unsafe_chars() {
        assert_eq!(safe_symbol("BTC/USDT"), "BTC_USDT");
        assert_eq!(safe_symbol("X:BTCUSD"), "X_BTCUSD");
    }

    #[test]
    fn append_then_reappend_dedups_on_timestamp() {
        let path = tmp_path("dedup");
        std::fs::remove_file(&path).ok();

        append_csv(&path, &[bar(1), bar(2)]).unwrap();
        let mut overwritten = bar(2);
        overwritten.close = 999.0;
        append_csv(&path, &[overwritten, bar(3)]).unwrap();

        let rows = read_existing(&path).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[&2].close, 999.0);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn managed_path_follows_layout_convention() {
        let base = Path::new("data/managed");
        let path = managed_csv_path(base, "binance", "BTC/USDT", "1h");
        assert_eq!(path, Path::new("data/managed/binance/BTC_USDT/BTC_USDT_1h.csv"));
    }

    #[test]
    fn split_path_follows_layout_convention() {
        let base = Path::new("data/managed");
        let path = split_csv_path(base, "binance", "BTCUSDT", "1h", SplitKind::Train);
        assert_eq!(path, Path::new("data/managed/binance/BTCUSDT/splits/BTCUSDT_1h_train.csv"));
    }
}
