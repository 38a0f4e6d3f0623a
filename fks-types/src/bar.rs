use serde::{Deserialize, Serialize};

/// A single OHLCV bar, time-aligned to an interval boundary.
///
/// `ts` is UTC seconds since the epoch. The invariant `low <= min(open,close)
/// <= max(open,close) <= high` and `volume >= 0` is enforced during
/// normalization: rows that violate it are dropped, never repaired.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    /// UTC seconds since the epoch, aligned to the interval boundary.
    pub ts: i64,
    /// Opening price.
    pub open: f64,
    /// Highest price in the interval.
    pub high: f64,
    /// Lowest price in the interval.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Traded volume; always non-negative.
    pub volume: f64,
}

impl MarketBar {
    /// Whether this bar satisfies the OHLCV validity invariant.
    ///
    /// `low <= min(open, close) <= max(open, close) <= high` and `volume >= 0`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        self.low <= lo && hi <= self.high && self.volume >= 0.0 && self.low <= self.high
    }
}

/// A single time-series point, keyed by `(source, symbol, interval, ts)`.
///
/// All writes to the persistent store are idempotent on this key: the final
/// value at a given `ts` is whichever write was applied last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalBarRow {
    /// Provider/adapter name that produced this row.
    pub provider: String,
    /// The data source keyed in persistence; defaults to `provider`, but may
    /// diverge when a verification step substitutes a secondary provider's row.
    pub source: String,
    /// Instrument symbol as canonicalized by the adapter.
    pub symbol: String,
    /// Interval label (e.g. "1m", "1h", "1d").
    pub interval: String,
    /// The bar itself.
    pub bar: MarketBar,
}

impl CanonicalBarRow {
    /// Construct a row whose `source` defaults to the fetching `provider`.
    #[must_use]
    pub fn new(
        provider: impl Into<String>,
        symbol: impl Into<String>,
        interval: impl Into<String>,
        bar: MarketBar,
    ) -> Self {
        let provider = provider.into();
        Self {
            source: provider.clone(),
            provider,
            symbol: symbol.into(),
            interval: interval.into(),
            bar,
        }
    }

    /// The primary-key tuple this row would be persisted under.
    #[must_use]
    pub fn key(&self) -> (String, String, String, i64) {
        (
            self.source.clone(),
            self.symbol.clone(),
            self.interval.clone(),
            self.bar.ts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: f64, high: f64, low: f64, close: f64, volume: f64) -> MarketBar {
        MarketBar {
            ts: 0,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn valid_bar_passes() {
        assert!(bar(100.0, 101.0, 99.5, 100.5, 123.45).is_valid());
    }

    #[test]
    fn high_below_close_is_invalid() {
        assert!(!bar(100.0, 100.2, 99.5, 100.5, 1.0).is_valid());
    }

    #[test]
    fn low_above_open_is_invalid() {
        assert!(!bar(100.0, 101.0, 100.1, 100.5, 1.0).is_valid());
    }

    #[test]
    fn negative_volume_is_invalid() {
        assert!(!bar(100.0, 101.0, 99.0, 100.5, -1.0).is_valid());
    }

    #[test]
    fn degenerate_quote_bar_is_valid() {
        // open=high=low=close, as synthesized for quote/ticker providers.
        assert!(bar(50.0, 50.0, 50.0, 50.0, 0.0).is_valid());
    }
}
