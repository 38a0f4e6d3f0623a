use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::bar::MarketBar;

/// A quote/ticker row: a point-in-time price plus provider-specific market
/// statistics, with a degenerate OHLCV view (`open=high=low=close=price`) so
/// downstream consumers can treat every provider family uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    /// UTC seconds since the epoch.
    pub ts: i64,
    /// Instrument symbol.
    pub symbol: String,
    /// Latest traded/quoted price.
    pub price: f64,
    /// Rolling 24h volume, if the provider reports it.
    pub volume_24h: Option<f64>,
    /// Market capitalization, if applicable.
    pub market_cap: Option<f64>,
    /// 24h percent change, if reported.
    pub percent_change_24h: Option<f64>,
}

impl QuoteRow {
    /// Synthesize a degenerate OHLCV bar from this quote (`open=high=low=close=price`).
    #[must_use]
    pub fn as_bar(&self) -> MarketBar {
        MarketBar {
            ts: self.ts,
            open: self.price,
            high: self.price,
            low: self.price,
            close: self.price,
            volume: self.volume_24h.unwrap_or(0.0),
        }
    }
}

/// A time-series point for fundamentals/macro providers: a bare `(ts, value)`
/// pair, optionally carrying OHLCV when the provider exposes it, plus a
/// sidecar map for provider-specific extra fields (earnings estimate/actual,
/// insider transaction counts, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRow {
    /// UTC seconds since the epoch.
    pub ts: i64,
    /// The series value.
    pub value: f64,
    /// OHLCV, when the provider also exposes bar-shaped data for this point.
    pub ohlcv: Option<MarketBar>,
    /// Provider-specific extra fields not modeled in the canonical schema.
    pub extra: HashMap<String, serde_json::Value>,
}

/// Futures microstructure event family (`aggs`/`trades`/`quotes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FuturesEvent {
    /// An aggregate bar with futures-specific extras.
    Agg {
        /// The underlying OHLCV bar.
        bar: MarketBar,
        /// Number of transactions in the aggregate window.
        transactions: Option<u64>,
        /// Dollar volume (price-weighted volume) for the window.
        dollar_volume: Option<f64>,
        /// Settlement price, when reported at session close.
        settlement_price: Option<f64>,
    },
    /// A single executed trade.
    Trade {
        /// UTC seconds since the epoch.
        ts: i64,
        /// Trade price.
        price: f64,
        /// Trade size.
        size: f64,
        /// Provider-native ticker symbol.
        ticker: String,
    },
    /// A single top-of-book quote.
    Quote {
        /// UTC seconds since the epoch.
        ts: i64,
        /// Best bid price.
        bid_price: f64,
        /// Best bid size.
        bid_size: f64,
        /// Best ask price.
        ask_price: f64,
        /// Best ask size.
        ask_size: f64,
    },
}

/// A tagged variant of a normalized provider row.
///
/// Rather than stretch one row schema with optional fields for every
/// provider family, adapters emit the variant that fits their endpoint; the
/// store routes `Bar`s to `ohlcv`, `Event`s to domain-specific tables. This
/// keeps consumers exhaustive-match instead of duck-typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "row_kind", rename_all = "snake_case")]
pub enum NormalizedRow {
    /// A bar/kline row (exchange klines, aggregate bars).
    Bar(MarketBar),
    /// A quote/ticker row.
    Quote(QuoteRow),
    /// A fundamentals/macro time-series point.
    Series(SeriesRow),
    /// A futures microstructure event.
    Event(FuturesEvent),
}

impl NormalizedRow {
    /// The row's timestamp, regardless of variant.
    #[must_use]
    pub fn ts(&self) -> i64 {
        match self {
            Self::Bar(b) => b.ts,
            Self::Quote(q) => q.ts,
            Self::Series(s) => s.ts,
            Self::Event(FuturesEvent::Agg { bar, .. }) => bar.ts,
            Self::Event(FuturesEvent::Trade { ts, .. } | FuturesEvent::Quote { ts, .. }) => *ts,
        }
    }
}

/// The request echoed back to the caller as part of a fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Canonical instrument symbol.
    pub symbol: String,
    /// Interval/granularity label.
    pub interval: String,
    /// Inclusive start of the requested range, UTC seconds.
    pub start: Option<i64>,
    /// Inclusive end of the requested range, UTC seconds.
    pub end: Option<i64>,
    /// Maximum number of rows requested.
    pub limit: Option<u32>,
}

/// The contract returned by every provider adapter's `fetch` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFetchResult {
    /// Name of the adapter that produced this result.
    pub provider: String,
    /// Normalized rows, sorted ascending by timestamp.
    pub data: Vec<NormalizedRow>,
    /// The request that was echoed back.
    pub request: FetchRequest,
}

impl CanonicalFetchResult {
    /// Whether the `ts` sequence across `data` is strictly non-decreasing.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.data.windows(2).all(|w| w[0].ts() <= w[1].ts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_row_synthesizes_degenerate_bar() {
        let q = QuoteRow {
            ts: 10,
            symbol: "BTC".into(),
            price: 42.0,
            volume_24h: Some(5.0),
            market_cap: None,
            percent_change_24h: None,
        };
        let bar = q.as_bar();
        assert_eq!(bar.open, 42.0);
        assert_eq!(bar.high, 42.0);
        assert_eq!(bar.low, 42.0);
        assert_eq!(bar.close, 42.0);
        assert_eq!(bar.volume, 5.0);
        assert!(bar.is_valid());
    }

    #[test]
    fn monotonic_check_on_sorted_rows() {
        let mk = |ts| {
            NormalizedRow::Bar(MarketBar {
                ts,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0.0,
            })
        };
        let result = CanonicalFetchResult {
            provider: "mock".into(),
            data: vec![mk(1), mk(2), mk(2), mk(3)],
            request: FetchRequest {
                symbol: "X".into(),
                interval: "1m".into(),
                start: None,
                end: None,
                limit: None,
            },
        };
        assert!(result.is_monotonic());
    }

    #[test]
    fn monotonic_check_catches_regression() {
        let mk = |ts| {
            NormalizedRow::Bar(MarketBar {
                ts,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 0.0,
            })
        };
        let result = CanonicalFetchResult {
            provider: "mock".into(),
            data: vec![mk(2), mk(1)],
            request: FetchRequest {
                symbol: "X".into(),
                interval: "1m".into(),
                start: None,
                end: None,
                limit: None,
            },
        };
        assert!(!result.is_monotonic());
    }
}
