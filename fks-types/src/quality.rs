use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Method used by the outlier detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
    /// Flag points whose z-score exceeds a threshold.
    ZScore,
    /// Flag points outside `[Q1 - tau*IQR, Q3 + tau*IQR]`.
    Iqr,
    /// Flag points whose robust (median-based) deviation exceeds a threshold.
    Mad,
}

/// Qualitative severity bucket for a set of detected outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Outlier share `<= 5%`.
    Low,
    /// Outlier share in `(5%, 10%]`.
    Medium,
    /// Outlier share `> 10%`.
    High,
}

/// Result of running an outlier detector over one field of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierResult {
    /// Field the detector ran over (e.g. "close").
    pub field: String,
    /// Indices, within the input series, flagged as outliers.
    pub outlier_indices: Vec<usize>,
    /// Number of flagged points.
    pub outlier_count: usize,
    /// Method used to produce this result.
    pub method: OutlierMethod,
    /// Threshold applied.
    pub threshold: f64,
    /// Severity bucket derived from the outlier share.
    pub severity: Severity,
}

/// Freshness classification for a symbol's most recent data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessStatus {
    /// Age is within the fresh threshold.
    Fresh,
    /// Age exceeds the fresh threshold but not the critical one.
    Warning,
    /// Age exceeds the critical threshold.
    Critical,
}

/// Result of running the freshness monitor for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessResult {
    /// Symbol checked.
    pub symbol: String,
    /// Timestamp of the most recent observed point, UTC seconds.
    pub last_ts: i64,
    /// Seconds between `now` and `last_ts`.
    pub age_seconds: i64,
    /// Classification of `age_seconds` against the configured thresholds.
    pub status: FreshnessStatus,
    /// Number of gaps detected in the series (consecutive interval larger
    /// than `expected_frequency * gap_tolerance`).
    pub gaps_detected: usize,
    /// Expected frequency label used for the check (e.g. "1m").
    pub expected_frequency: String,
}

/// Completeness status bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletenessStatus {
    /// `completeness_pct >= 99`.
    Excellent,
    /// `completeness_pct >= 95`.
    Good,
    /// `completeness_pct >= 90`.
    Fair,
    /// `completeness_pct < 90`.
    Poor,
}

/// Result of running the completeness validator for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessResult {
    /// Symbol checked.
    pub symbol: String,
    /// Total rows considered.
    pub total_rows: usize,
    /// Rows with every required field non-null.
    pub complete_rows: usize,
    /// `100 * complete_rows / total_rows`.
    pub completeness_pct: f64,
    /// Count of missing values per required field.
    pub missing_fields: HashMap<String, usize>,
    /// Missing timestamps relative to the expected date range at the
    /// nominal frequency.
    pub gaps_detected: usize,
    /// Whether `total_rows >= min_points`.
    pub min_points_met: bool,
    /// Status band derived from `completeness_pct` (and halved if
    /// `min_points_met` is false, per the composite scorer's rule).
    pub status: CompletenessStatus,
}

/// Overall quality status bands, derived from the weighted composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    /// `overall >= 85`.
    Excellent,
    /// `overall >= 70`.
    Good,
    /// `overall >= 50`.
    Fair,
    /// `overall < 50`.
    Poor,
}

/// Component scores feeding the composite quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityComponents {
    /// Outlier component score, `0..=100`.
    pub outlier: f64,
    /// Freshness component score, `0..=100`.
    pub freshness: f64,
    /// Completeness component score, `0..=100`.
    pub completeness: f64,
}

/// Weighted composite data-quality score for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Symbol scored.
    pub symbol: String,
    /// Weighted composite in `0..=100`.
    pub overall: f64,
    /// The three component scores that were combined.
    pub components: QualityComponents,
    /// Status band derived from `overall`.
    pub status: QualityStatus,
    /// Human-readable list of detected issues.
    pub issues: Vec<String>,
    /// Human-readable list of recommended actions.
    pub recommendations: Vec<String>,
    /// When the score was computed.
    pub timestamp: DateTime<Utc>,
}

/// Weights applied to each component when combining into the composite score.
///
/// Construction fails fast (see [`QualityWeights::new`]) unless the three
/// weights sum to `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityWeights {
    /// Weight applied to the outlier component score.
    pub outlier: f64,
    /// Weight applied to the freshness component score.
    pub freshness: f64,
    /// Weight applied to the completeness component score.
    pub completeness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            outlier: 0.3,
            freshness: 0.3,
            completeness: 0.4,
        }
    }
}

impl QualityWeights {
    /// Construct weights, validating that they sum to `1.0` (within a small
    /// floating-point epsilon).
    ///
    /// # Errors
    /// Returns a description of the mismatch if the weights do not sum to `1.0`.
    pub fn new(outlier: f64, freshness: f64, completeness: f64) -> Result<Self, String> {
        let total = outlier + freshness + completeness;
        if (total - 1.0).abs() > 1e-6 {
            return Err(format!("weights must sum to 1.0, got {total}"));
        }
        Ok(Self {
            outlier,
            freshness,
            completeness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let w = QualityWeights::default();
        assert!((w.outlier + w.freshness + w.completeness - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_weights_not_summing_to_one() {
        assert!(QualityWeights::new(0.5, 0.3, 0.3).is_err());
    }

    #[test]
    fn accepts_weights_summing_to_one() {
        assert!(QualityWeights::new(0.2, 0.3, 0.5).is_ok());
    }
}
