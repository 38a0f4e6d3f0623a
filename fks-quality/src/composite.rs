//! The composite quality scorer: combines outlier, freshness, and
//! completeness results into a single weighted `0..=100` score with
//! derived issues and recommendations.

use chrono::Utc;
use fks_types::{
    CompletenessResult, CompletenessStatus, FreshnessResult, FreshnessStatus, OutlierResult,
    QualityComponents, QualityScore, QualityStatus, QualityWeights, Severity,
};

/// Score a single outlier component: `0` at `>=10%` outliers, `100` at
/// `0%`, linear in between.
#[must_use]
pub fn score_outliers(results: &[OutlierResult], total_rows: usize) -> f64 {
    if total_rows == 0 {
        return 0.0;
    }
    let total_outliers: usize = results.iter().map(|r| r.outlier_count).sum();
    let outlier_pct = (total_outliers as f64 / total_rows as f64) * 100.0;
    (100.0 - 10.0 * outlier_pct).max(0.0)
}

/// Score the freshness component per the composite scorer's decay curve.
#[must_use]
pub fn score_freshness(result: &FreshnessResult) -> f64 {
    let age_minutes = if result.age_seconds == i64::MAX {
        f64::INFINITY
    } else {
        result.age_seconds as f64 / 60.0
    };
    match result.status {
        FreshnessStatus::Fresh => 100.0,
        FreshnessStatus::Warning => {
            let clamped = age_minutes.min(15.0);
            (100.0 - ((clamped - 1.0) / 14.0) * 50.0).max(50.0)
        }
        FreshnessStatus::Critical => {
            let clamped = age_minutes.min(60.0);
            (50.0 - ((clamped - 15.0) / 45.0) * 50.0).max(0.0)
        }
    }
}

/// Score the completeness component, halved when `min_points_met` is false.
#[must_use]
pub fn score_completeness(result: &CompletenessResult) -> f64 {
    let mut score = result.completeness_pct;
    if !result.min_points_met {
        score *= 0.5;
    }
    score.clamp(0.0, 100.0)
}

fn classify(overall: f64) -> QualityStatus {
    if overall >= 85.0 {
        QualityStatus::Excellent
    } else if overall >= 70.0 {
        QualityStatus::Good
    } else if overall >= 50.0 {
        QualityStatus::Fair
    } else {
        QualityStatus::Poor
    }
}

fn identify_issues(
    outliers: &[OutlierResult],
    freshness: &FreshnessResult,
    completeness: &CompletenessResult,
) -> Vec<String> {
    let mut issues = Vec::new();

    for result in outliers {
        if matches!(result.severity, Severity::Medium | Severity::High) {
            issues.push(format!(
                "outliers in {}: {} ({:?} severity)",
                result.field, result.outlier_count, result.severity
            ));
        }
    }

    if !matches!(freshness.status, FreshnessStatus::Fresh) {
        issues.push(format!(
            "stale data: {:.1} minutes old ({:?})",
            freshness.age_seconds as f64 / 60.0,
            freshness.status
        ));
    }
    if freshness.gaps_detected > 0 {
        issues.push(format!("time-series gaps: {} detected", freshness.gaps_detected));
    }

    if completeness.completeness_pct < 95.0 {
        issues.push(format!(
            "incomplete data: {:.1}% complete ({:?})",
            completeness.completeness_pct, completeness.status
        ));
    }
    for (field, count) in &completeness.missing_fields {
        if *count > 0 {
            issues.push(format!("missing {field}: {count} values"));
        }
    }
    if !completeness.min_points_met {
        issues.push(format!(
            "insufficient data: {} rows (minimum required varies by feature)",
            completeness.total_rows
        ));
    }

    issues
}

fn generate_recommendations(
    issues: &[String],
    outlier_score: f64,
    freshness_score: f64,
    completeness_score: f64,
) -> Vec<String> {
    if issues.is_empty() {
        return vec!["data quality is excellent - no action needed".to_string()];
    }

    let mut recs = Vec::new();
    if outlier_score < 70.0 {
        recs.push("clean outliers using interpolation or winsorization".to_string());
        recs.push("verify data source for potential anomalies".to_string());
    }
    if freshness_score < 70.0 {
        recs.push("refresh data from source immediately".to_string());
        recs.push("increase data collection frequency".to_string());
        recs.push("set up alerts for stale data detection".to_string());
    }
    if completeness_score < 70.0 {
        recs.push("fill missing values using forward fill or interpolation".to_string());
        recs.push("extend data collection period to meet minimum points".to_string());
        recs.push("validate data pipeline for gaps".to_string());
    }
    recs
}

/// Combine component results into a weighted composite [`QualityScore`].
#[must_use]
pub fn score(
    symbol: &str,
    outliers: &[OutlierResult],
    total_rows: usize,
    freshness: &FreshnessResult,
    completeness: &CompletenessResult,
    weights: QualityWeights,
) -> QualityScore {
    let outlier_score = score_outliers(outliers, total_rows);
    let freshness_score = score_freshness(freshness);
    let completeness_score = score_completeness(completeness);

    let overall = outlier_score * weights.outlier
        + freshness_score * weights.freshness
        + completeness_score * weights.completeness;

    let issues = identify_issues(outliers, freshness, completeness);
    let recommendations =
        generate_recommendations(&issues, outlier_score, freshness_score, completeness_score);

    QualityScore {
        symbol: symbol.to_string(),
        overall,
        components: QualityComponents {
            outlier: outlier_score,
            freshness: freshness_score,
            completeness: completeness_score,
        },
        status: classify(overall),
        issues,
        recommendations,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fks_types::OutlierMethod;
    use std::collections::HashMap;

    fn fresh_result() -> FreshnessResult {
        FreshnessResult {
            symbol: "BTC".to_string(),
            last_ts: 1_000,
            age_seconds: 10,
            status: FreshnessStatus::Fresh,
            gaps_detected: 0,
            expected_frequency: "1m".to_string(),
        }
    }

    fn complete_result() -> CompletenessResult {
        CompletenessResult {
            symbol: "BTC".to_string(),
            total_rows: 100,
            complete_rows: 100,
            completeness_pct: 100.0,
            missing_fields: HashMap::new(),
            gaps_detected: 0,
            min_points_met: true,
            status: CompletenessStatus::Excellent,
        }
    }

    #[test]
    fn clean_data_scores_excellent_with_no_issues() {
        let result = score("BTC", &[], 100, &fresh_result(), &complete_result(), QualityWeights::default());
        assert_eq!(result.status, QualityStatus::Excellent);
        assert!(result.issues.is_empty());
        assert_eq!(result.recommendations, vec!["data quality is excellent - no action needed"]);
    }

    #[test]
    fn high_severity_outliers_and_staleness_degrade_score() {
        let outliers = vec![OutlierResult {
            field: "close".to_string(),
            outlier_indices: (0..15).collect(),
            outlier_count: 15,
            method: OutlierMethod::ZScore,
            threshold: 3.0,
            severity: Severity::High,
        }];
        let stale = FreshnessResult {
            status: FreshnessStatus::Warning,
            age_seconds: 10 * 60,
            ..fresh_result()
        };
        let result = score("BTC", &outliers, 100, &stale, &complete_result(), QualityWeights::default());
        assert!(result.overall < 85.0);
        assert!(!result.issues.is_empty());
    }

    #[test]
    fn scenario_matches_documented_fair_band() {
        // 6% outlier rate (medium severity), 12-minute-old 1m data
        // (warning), fair completeness -> outlier=40, freshness=60.71,
        // completeness=90, overall = 0.3*40 + 0.3*60.71 + 0.4*90 = 66.21.
        let outliers = vec![OutlierResult {
            field: "close".to_string(),
            outlier_indices: (0..6).collect(),
            outlier_count: 6,
            method: OutlierMethod::ZScore,
            threshold: 3.0,
            severity: Severity::Medium,
        }];
        let freshness = FreshnessResult {
            status: FreshnessStatus::Warning,
            age_seconds: 12 * 60,
            ..fresh_result()
        };
        let completeness = CompletenessResult {
            completeness_pct: 90.0,
            status: CompletenessStatus::Fair,
            ..complete_result()
        };
        let result =
            score("BTC", &outliers, 100, &freshness, &completeness, QualityWeights::default());
        assert_eq!(result.status, QualityStatus::Fair);
        assert!(result.overall >= 50.0 && result.overall < 70.0, "overall={}", result.overall);
    }
}
