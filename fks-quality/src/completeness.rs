//! Completeness validation for OHLCV bar series: required-field null
//! counting, completeness percentage, and status banding.

use std::collections::HashMap;

use fks_types::{CompletenessResult, CompletenessStatus, MarketBar};

use crate::freshness::frequency_seconds;

/// Completeness validator configuration.
#[derive(Debug, Clone, Copy)]
pub struct CompletenessConfig {
    /// Minimum number of rows required to consider the series adequately
    /// sized for downstream feature computation.
    pub min_points: usize,
}

impl Default for CompletenessConfig {
    fn default() -> Self {
        Self { min_points: 50 }
    }
}

const REQUIRED_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

fn field_is_missing(bar: &MarketBar, field: &str) -> bool {
    match field {
        "open" => bar.open.is_nan(),
        "high" => bar.high.is_nan(),
        "low" => bar.low.is_nan(),
        "close" => bar.close.is_nan(),
        "volume" => bar.volume.is_nan(),
        _ => false,
    }
}

/// Validate completeness of `bars` for `symbol`, assumed sorted ascending
/// by `ts`.
#[must_use]
pub fn validate(
    symbol: &str,
    bars: &[MarketBar],
    expected_frequency: Option<&str>,
    cfg: CompletenessConfig,
) -> CompletenessResult {
    if bars.is_empty() {
        return CompletenessResult {
            symbol: symbol.to_string(),
            total_rows: 0,
            complete_rows: 0,
            completeness_pct: 0.0,
            missing_fields: REQUIRED_FIELDS.iter().map(|f| (f.to_string(), 0)).collect(),
            gaps_detected: 0,
            min_points_met: false,
            status: CompletenessStatus::Poor,
        };
    }

    let total_rows = bars.len();
    let mut missing_fields: HashMap<String, usize> = HashMap::new();
    for field in REQUIRED_FIELDS {
        let count = bars.iter().filter(|b| field_is_missing(b, field)).count();
        missing_fields.insert(field.to_string(), count);
    }

    let complete_rows =
        bars.iter().filter(|b| REQUIRED_FIELDS.iter().all(|f| !field_is_missing(b, f))).count();
    let completeness_pct = (complete_rows as f64 / total_rows as f64) * 100.0;
    let min_points_met = total_rows >= cfg.min_points;

    let gaps_detected = expected_frequency
        .and_then(frequency_seconds)
        .map(|expected| expected_gap_count(bars, expected))
        .unwrap_or(0);

    let status = classify(completeness_pct);

    CompletenessResult {
        symbol: symbol.to_string(),
        total_rows,
        complete_rows,
        completeness_pct,
        missing_fields,
        gaps_detected,
        min_points_met,
        status,
    }
}

/// Missing timestamps relative to the expected date range at the nominal
/// frequency: `(span / expected_interval) + 1 - observed_count`, floored at
/// zero.
fn expected_gap_count(bars: &[MarketBar], expected_interval: i64) -> usize {
    if bars.len() < 2 || expected_interval <= 0 {
        return 0;
    }
    let span = bars.last().unwrap().ts - bars.first().unwrap().ts;
    let expected_count = (span / expected_interval) + 1;
    (expected_count - bars.len() as i64).max(0) as usize
}

fn classify(pct: f64) -> CompletenessStatus {
    if pct >= 99.0 {
        CompletenessStatus::Excellent
    } else if pct >= 95.0 {
        CompletenessStatus::Good
    } else if pct >= 90.0 {
        CompletenessStatus::Fair
    } else {
        CompletenessStatus::Poor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> MarketBar {
        MarketBar { ts, open: close, high: close, low: close, close, volume: 1.0 }
    }

    #[test]
    fn fully_populated_series_is_excellent() {
        let bars: Vec<MarketBar> = (0..60).map(|i| bar(i * 60, 100.0 + i as f64)).collect();
        let result = validate("BTC", &bars, Some("1m"), CompletenessConfig::default());
        assert_eq!(result.status, CompletenessStatus::Excellent);
        assert!(result.min_points_met);
        assert_eq!(result.gaps_detected, 0);
    }

    #[test]
    fn nan_fields_count_as_missing() {
        let mut bars: Vec<MarketBar> = (0..60).map(|i| bar(i * 60, 100.0)).collect();
        bars[10].close = f64::NAN;
        let result = validate("BTC", &bars, None, CompletenessConfig::default());
        assert_eq!(result.missing_fields["close"], 1);
        assert_eq!(result.complete_rows, 59);
    }

    #[test]
    fn below_min_points_is_flagged() {
        let bars: Vec<MarketBar> = (0..10).map(|i| bar(i * 60, 100.0)).collect();
        let result = validate("BTC", &bars, None, CompletenessConfig::default());
        assert!(!result.min_points_met);
    }

    #[test]
    fn empty_series_is_poor() {
        let result = validate("BTC", &[], None, CompletenessConfig::default());
        assert_eq!(result.status, CompletenessStatus::Poor);
        assert_eq!(result.total_rows, 0);
    }

    #[test]
    fn missing_timestamps_detected_against_expected_frequency() {
        let bars = vec![bar(0, 100.0), bar(60, 101.0), bar(240, 102.0)];
        let result = validate("BTC", &bars, Some("1m"), CompletenessConfig::default());
        assert_eq!(result.gaps_detected, 2);
    }
}
