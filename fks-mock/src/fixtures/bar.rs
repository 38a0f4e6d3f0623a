//! Deterministic bar/kline fixtures, shaped like the `binance` adapter's
//! output.

use fks_types::{MarketBar, NormalizedRow};

/// Three hourly bars for `BTCUSDT`, strictly increasing in `ts` and `close`.
#[must_use]
pub fn by_symbol(symbol: &str) -> Option<Vec<NormalizedRow>> {
    match symbol {
        "BTCUSDT" => Some(vec![
            NormalizedRow::Bar(MarketBar {
                ts: 1_732_636_800,
                open: 95_000.0,
                high: 95_500.0,
                low: 94_800.0,
                close: 95_200.0,
                volume: 120.5,
            }),
            NormalizedRow::Bar(MarketBar {
                ts: 1_732_640_400,
                open: 95_200.0,
                high: 95_900.0,
                low: 95_100.0,
                close: 95_700.0,
                volume: 98.2,
            }),
            NormalizedRow::Bar(MarketBar {
                ts: 1_732_644_000,
                open: 95_700.0,
                high: 96_100.0,
                low: 95_600.0,
                close: 96_000.0,
                volume: 110.0,
            }),
        ]),
        _ => None,
    }
}
