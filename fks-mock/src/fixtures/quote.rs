//! Deterministic quote/ticker fixtures, shaped like the `cmc` adapter's
//! output.

use fks_types::{NormalizedRow, QuoteRow};

/// A single latest quote for `BTC`.
#[must_use]
pub fn by_symbol(symbol: &str) -> Option<Vec<NormalizedRow>> {
    match symbol {
        "BTC" => Some(vec![NormalizedRow::Quote(QuoteRow {
            ts: 1_732_636_800,
            symbol: "BTC".to_string(),
            price: 95_200.0,
            volume_24h: Some(42_000_000_000.0),
            market_cap: Some(1_880_000_000_000.0),
            percent_change_24h: Some(1.8),
        })]),
        _ => None,
    }
}
