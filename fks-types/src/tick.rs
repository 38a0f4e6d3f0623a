use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the book initiated a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Buyer-initiated trade.
    Buy,
    /// Seller-initiated trade.
    Sell,
    /// Side could not be determined from the provider payload.
    Unknown,
}

/// A single trade or quote update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// UTC seconds since the epoch.
    pub ts: i64,
    /// Instrument symbol.
    pub symbol: String,
    /// Trade price; always non-negative.
    pub price: Decimal,
    /// Trade volume; always non-negative.
    pub volume: Decimal,
    /// Aggressor side, if known.
    pub side: Side,
    /// Provider/source name.
    pub source: String,
    /// Provider-native trade identifier, if present.
    pub trade_id: Option<String>,
    /// Whether the counterparty was a market maker, if known.
    pub is_market_maker: Option<bool>,
}

/// A single price level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    /// Price at this level.
    pub price: f64,
    /// Aggregate size resting at this level.
    pub size: f64,
}

/// A snapshot of an order book: bids sorted strictly descending by price,
/// asks sorted strictly ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Instrument symbol.
    pub symbol: String,
    /// UTC seconds since the epoch.
    pub ts: i64,
    /// Bid levels, strictly descending by price.
    pub bids: Vec<OrderBookLevel>,
    /// Ask levels, strictly ascending by price.
    pub asks: Vec<OrderBookLevel>,
}

impl OrderBook {
    /// Depth of the book: `max(|bids|, |asks|)`.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.bids.len().max(self.asks.len())
    }

    /// Whether bids are strictly descending and asks strictly ascending.
    #[must_use]
    pub fn is_well_ordered(&self) -> bool {
        let bids_ok = self
            .bids
            .windows(2)
            .all(|w| w[0].price > w[1].price);
        let asks_ok = self
            .asks
            .windows(2)
            .all(|w| w[0].price < w[1].price);
        bids_ok && asks_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_is_max_of_sides() {
        let ob = OrderBook {
            symbol: "BTCUSDT".into(),
            ts: 0,
            bids: vec![
                OrderBookLevel { price: 100.0, size: 1.0 },
                OrderBookLevel { price: 99.0, size: 2.0 },
            ],
            asks: vec![OrderBookLevel { price: 101.0, size: 1.0 }],
        };
        assert_eq!(ob.depth(), 2);
        assert!(ob.is_well_ordered());
    }

    #[test]
    fn detects_unordered_book() {
        let ob = OrderBook {
            symbol: "BTCUSDT".into(),
            ts: 0,
            bids: vec![
                OrderBookLevel { price: 99.0, size: 1.0 },
                OrderBookLevel { price: 100.0, size: 2.0 },
            ],
            asks: vec![],
        };
        assert!(!ob.is_well_ordered());
    }
}
