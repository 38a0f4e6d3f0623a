//! Deterministic fundamentals/time-series fixtures, shaped like the `eodhd`
//! adapter's earnings-calendar output.

use std::collections::HashMap;

use fks_types::{NormalizedRow, SeriesRow};

/// Two quarterly earnings rows for `AAPL.US`.
#[must_use]
pub fn by_symbol(symbol: &str) -> Option<Vec<NormalizedRow>> {
    match symbol {
        "AAPL.US" => {
            let mut extra_q1 = HashMap::new();
            extra_q1.insert("estimate".to_string(), serde_json::json!(1.5));
            extra_q1.insert("company_name".to_string(), serde_json::json!("Apple Inc"));
            extra_q1.insert("surprise_percent".to_string(), serde_json::json!(9.3));

            let mut extra_q2 = HashMap::new();
            extra_q2.insert("estimate".to_string(), serde_json::json!(1.6));
            extra_q2.insert("company_name".to_string(), serde_json::json!("Apple Inc"));
            extra_q2.insert("surprise_percent".to_string(), serde_json::json!(-2.1));

            Some(vec![
                NormalizedRow::Series(SeriesRow {
                    ts: 1_722_000_000,
                    value: 1.64,
                    ohlcv: None,
                    extra: extra_q1,
                }),
                NormalizedRow::Series(SeriesRow {
                    ts: 1_730_000_000,
                    value: 1.57,
                    ohlcv: None,
                    extra: extra_q2,
                }),
            ])
        }
        _ => None,
    }
}
