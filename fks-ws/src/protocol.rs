//! The wire protocol spoken over the WebSocket endpoint: plain JSON
//! objects in both directions, tagged by `action`
//! (client → server) or `type` (server → client).

use fks_types::{FuturesEvent, MarketBar, NormalizedRow, QuoteRow};
use serde::{Deserialize, Serialize};

/// A message sent by the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Add `symbols`/`timeframes` (and optionally pin a `provider`) to this
    /// connection's subscription.
    Subscribe {
        /// Symbols to add.
        #[serde(default)]
        symbols: Vec<String>,
        /// Timeframes/intervals to add.
        #[serde(default)]
        timeframes: Vec<String>,
        /// Upstream provider to pin this subscription to, if any.
        #[serde(default)]
        provider: Option<String>,
    },
    /// Remove `symbols`/`timeframes` from this connection's subscription.
    Unsubscribe {
        /// Symbols to remove.
        #[serde(default)]
        symbols: Vec<String>,
        /// Timeframes/intervals to remove.
        #[serde(default)]
        timeframes: Vec<String>,
    },
    /// Liveness probe; answered with `ServerMessage::Pong`.
    Ping,
}

/// A message sent to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a subscription change.
    Status {
        /// Human-readable description of the change.
        message: String,
        /// The connection's symbols after applying the change.
        symbols: Vec<String>,
        /// The connection's timeframes after applying the change.
        timeframes: Vec<String>,
    },
    /// Answers a `ClientMessage::Ping`.
    Pong,
    /// A normalized bar/kline event.
    Ohlcv {
        /// Instrument symbol.
        symbol: String,
        /// Interval/granularity label.
        interval: String,
        /// The bar itself.
        bar: MarketBar,
    },
    /// A normalized single-trade event.
    Trade {
        /// Instrument symbol.
        symbol: String,
        /// UTC seconds since the epoch.
        ts: i64,
        /// Trade price.
        price: f64,
        /// Trade size.
        size: f64,
    },
    /// A normalized top-of-book quote event.
    Quote {
        /// Instrument symbol.
        symbol: String,
        /// The quote row itself.
        quote: QuoteRow,
    },
    /// A protocol or upstream error, surfaced to the client without
    /// closing the connection.
    Error {
        /// Description of the error.
        message: String,
    },
}

/// Wrap one normalized row for broadcast, carrying the `(symbol,
/// interval)` it was produced for so connection tasks can filter without
/// re-deriving it from the row itself (quotes/trades don't always carry
/// the interval the client subscribed under).
#[derive(Debug, Clone)]
pub struct FanoutEvent {
    /// Instrument symbol this event is about.
    pub symbol: String,
    /// Interval/timeframe label, when the row family carries one.
    pub interval: Option<String>,
    /// The normalized row.
    pub row: NormalizedRow,
}

impl FanoutEvent {
    /// Convert to the wire representation sent to a matching client.
    #[must_use]
    pub fn to_server_message(&self) -> ServerMessage {
        match &self.row {
            NormalizedRow::Bar(bar) => ServerMessage::Ohlcv {
                symbol: self.symbol.clone(),
                interval: self.interval.clone().unwrap_or_default(),
                bar: bar.clone(),
            },
            NormalizedRow::Quote(quote) => ServerMessage::Quote {
                symbol: self.symbol.clone(),
                quote: quote.clone(),
            },
            NormalizedRow::Series(series) => ServerMessage::Ohlcv {
                symbol: self.symbol.clone(),
                interval: self.interval.clone().unwrap_or_default(),
                bar: series.ohlcv.clone().unwrap_or(MarketBar {
                    ts: series.ts,
                    open: series.value,
                    high: series.value,
                    low: series.value,
                    close: series.value,
                    volume: 0.0,
                }),
            },
            NormalizedRow::Event(FuturesEvent::Agg { bar, .. }) => ServerMessage::Ohlcv {
                symbol: self.symbol.clone(),
                interval: self.interval.clone().unwrap_or_default(),
                bar: bar.clone(),
            },
            NormalizedRow::Event(FuturesEvent::Trade { ts, price, size, .. }) => ServerMessage::Trade {
                symbol: self.symbol.clone(),
                ts: *ts,
                price: *price,
                size: *size,
            },
            NormalizedRow::Event(FuturesEvent::Quote {
                ts,
                bid_price,
                bid_size,
                ask_price,
                ask_size,
            }) => ServerMessage::Quote {
                symbol: self.symbol.clone(),
                quote: QuoteRow {
                    ts: *ts,
                    symbol: self.symbol.clone(),
                    price: (bid_price + ask_price) / 2.0,
                    volume_24h: Some(bid_size + ask_size),
                    market_cap: None,
                    percent_change_24h: None,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_message_parses_with_defaults() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"action":"subscribe","symbols":["BTCUSDT"],"timeframes":["1h"]}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Subscribe {
                symbols,
                timeframes,
                provider,
            } => {
                assert_eq!(symbols, vec!["BTCUSDT"]);
                assert_eq!(timeframes, vec!["1h"]);
                assert_eq!(provider, None);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn ping_message_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"action":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn bar_event_converts_to_ohlcv_server_message() {
        let event = FanoutEvent {
            symbol: "BTCUSDT".to_string(),
            interval: Some("1h".to_string()),
            row: NormalizedRow::Bar(MarketBar {
                ts: 0,
                open: 1.0,
                high: 2.0,
                low: 0.5,
                close: 1.5,
                volume: 10.0,
            }),
        };
        let msg = event.to_server_message();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "ohlcv");
        assert_eq!(json["symbol"], "BTCUSDT");
    }
}
