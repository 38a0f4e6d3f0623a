//! Freshness monitoring: age of the most recent point against configurable
//! thresholds, plus gap detection against an expected sampling frequency.

use fks_types::{FreshnessResult, FreshnessStatus};

/// Freshness thresholds and gap tolerance.
#[derive(Debug, Clone, Copy)]
pub struct FreshnessConfig {
    /// Age, in seconds, below which data is considered fresh.
    pub warning_threshold_secs: i64,
    /// Age, in seconds, above which data is considered critical.
    pub critical_threshold_secs: i64,
    /// Multiplier applied to the expected interval when flagging a gap.
    pub gap_tolerance: f64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            warning_threshold_secs: 5 * 60,
            critical_threshold_secs: 15 * 60,
            gap_tolerance: 1.5,
        }
    }
}

/// Parse an expected-frequency label (`1m`, `5m`, `15m`, `30m`, `1h`, `4h`,
/// `1d`) into seconds. Returns `None` for an unrecognized label.
#[must_use]
pub fn frequency_seconds(frequency: &str) -> Option<i64> {
    match frequency {
        "1m" => Some(60),
        "5m" => Some(5 * 60),
        "15m" => Some(15 * 60),
        "30m" => Some(30 * 60),
        "1h" => Some(3_600),
        "4h" => Some(4 * 3_600),
        "1d" => Some(86_400),
        _ => None,
    }
}

/// Check freshness of a sorted-ascending `timestamps` series against `now`.
///
/// `timestamps` is assumed sorted ascending; an empty slice yields a
/// `Critical` result with an unbounded age.
#[must_use]
pub fn check(
    symbol: &str,
    timestamps: &[i64],
    frequency: &str,
    now: i64,
    cfg: FreshnessConfig,
) -> FreshnessResult {
    let Some(&last_ts) = timestamps.last() else {
        return FreshnessResult {
            symbol: symbol.to_string(),
            last_ts: 0,
            age_seconds: i64::MAX,
            status: FreshnessStatus::Critical,
            gaps_detected: 0,
            expected_frequency: frequency.to_string(),
        };
    };

    let age_seconds = now - last_ts;
    let status = if age_seconds > cfg.critical_threshold_secs {
        FreshnessStatus::Critical
    } else if age_seconds > cfg.warning_threshold_secs {
        FreshnessStatus::Warning
    } else {
        FreshnessStatus::Fresh
    };

    let gaps_detected = frequency_seconds(frequency)
        .map(|expected| detect_gaps(timestamps, expected, cfg.gap_tolerance))
        .unwrap_or(0);

    FreshnessResult {
        symbol: symbol.to_string(),
        last_ts,
        age_seconds,
        status,
        gaps_detected,
        expected_frequency: frequency.to_string(),
    }
}

fn detect_gaps(timestamps: &[i64], expected_interval: i64, gap_tolerance: f64) -> usize {
    if timestamps.len() < 2 {
        return 0;
    }
    let threshold = (expected_interval as f64 * gap_tolerance) as i64;
    timestamps.windows(2).filter(|w| w[1] - w[0] > threshold).count()
}
