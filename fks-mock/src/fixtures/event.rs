//! Deterministic futures microstructure fixtures, shaped like the
//! `massive_futures` adapter's aggregate-bar output.

use fks_types::{FuturesEvent, MarketBar, NormalizedRow};

/// Two hourly aggregate events for the `ESZ24` futures contract.
#[must_use]
pub fn by_symbol(symbol: &str) -> Option<Vec<NormalizedRow>> {
    match symbol {
        "ESZ24" => Some(vec![
            NormalizedRow::Event(FuturesEvent::Agg {
                bar: MarketBar {
                    ts: 1_732_636_800,
                    open: 5_900.0,
                    high: 5_910.0,
                    low: 5_890.0,
                    close: 5_905.0,
                    volume: 1_200.0,
                },
                transactions: Some(340),
                dollar_volume: Some(7_086_000.0),
                settlement_price: None,
            }),
            NormalizedRow::Event(FuturesEvent::Agg {
                bar: MarketBar {
                    ts: 1_732_640_400,
                    open: 5_905.0,
                    high: 5_920.0,
                    low: 5_900.0,
                    close: 5_915.0,
                    volume: 980.0,
                },
                transactions: Some(290),
                dollar_volume: Some(5_796_700.0),
                settlement_price: Some(5_915.0),
            }),
        ]),
        _ => None,
    }
}
