//! Statistical outlier detection over a flat `f64` series: z-score, IQR, and
//! MAD methods, plus cleanup strategies to remove, interpolate, or
//! winsorize flagged points.

use fks_types::{OutlierMethod, OutlierResult, Severity};

/// Configuration for one run of the outlier detector.
#[derive(Debug, Clone, Copy)]
pub struct OutlierDetectorConfig {
    /// Detection method.
    pub method: OutlierMethod,
    /// Threshold: std-devs for z-score, IQR multiplier for IQR, MAD
    /// multiplier for MAD.
    pub threshold: f64,
    /// Minimum data points required; fewer than this and detection is
    /// skipped entirely (returns an empty result).
    pub min_periods: usize,
}

impl OutlierDetectorConfig {
    /// Default z-score configuration (`threshold=3.0`).
    #[must_use]
    pub const fn zscore() -> Self {
        Self { method: OutlierMethod::ZScore, threshold: 3.0, min_periods: 20 }
    }

    /// Default IQR configuration (`threshold=1.5`).
    #[must_use]
    pub const fn iqr() -> Self {
        Self { method: OutlierMethod::Iqr, threshold: 1.5, min_periods: 20 }
    }

    /// Default MAD configuration (`threshold=3.0`).
    #[must_use]
    pub const fn mad() -> Self {
        Self { method: OutlierMethod::Mad, threshold: 3.0, min_periods: 20 }
    }
}

/// Detect outliers in `field`'s values using `cfg`. Returns `None` if fewer
/// than `cfg.min_periods` values are present.
#[must_use]
pub fn detect(field: &str, values: &[f64], cfg: OutlierDetectorConfig) -> Option<OutlierResult> {
    if values.len() < cfg.min_periods {
        return None;
    }
    let indices = match cfg.method {
        OutlierMethod::ZScore => zscore_indices(values, cfg.threshold),
        OutlierMethod::Iqr => iqr_indices(values, cfg.threshold),
        OutlierMethod::Mad => mad_indices(values, cfg.threshold),
    };
    let severity = classify_severity(indices.len(), values.len());
    Some(OutlierResult {
        field: field.to_string(),
        outlier_count: indices.len(),
        outlier_indices: indices,
        method: cfg.method,
        threshold: cfg.threshold,
        severity,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn zscore_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    let mean = mean(values);
    let std = std_dev(values, mean);
    if std == 0.0 {
        return vec![];
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mean) / std).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Linear-interpolated quantile, matching pandas' default `quantile` method.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = pos - lower as f64;
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}

fn iqr_bounds(values: &[f64], threshold: f64) -> (f64, f64) {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - threshold * iqr, q3 + threshold * iqr)
}

fn iqr_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    let (lower, upper) = iqr_bounds(values, threshold);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < lower || **v > upper)
        .map(|(i, _)| i)
        .collect()
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

fn mad_indices(values: &[f64], threshold: f64) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let med = median(&sorted);
    let mut deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    deviations.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mad = median(&deviations);
    if mad == 0.0 {
        return vec![];
    }
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| (0.6745 * (*v - med) / mad).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

fn classify_severity(outlier_count: usize, total: usize) -> Severity {
    let pct = if total == 0 { 0.0 } else { (outlier_count as f64 / total as f64) * 100.0 };
    if pct > 10.0 {
        Severity::High
    } else if pct > 5.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// How to handle points a detector flagged as outliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStrategy {
    /// Drop flagged points entirely.
    Remove,
    /// Replace flagged points with a linear interpolation of their
    /// non-flagged neighbors.
    Interpolate,
    /// Clip flagged points to the 1.5*IQR bound they exceeded.
    Winsorize,
}

impl CleanupStrategy {
    /// Apply this strategy to `values` given the indices `result` flagged.
    #[must_use]
    pub fn apply(self, values: &[f64], result: &OutlierResult) -> Vec<f64> {
        match self {
            Self::Remove => values
                .iter()
                .enumerate()
                .filter(|(i, _)| !result.outlier_indices.contains(i))
                .map(|(_, v)| *v)
                .collect(),
            Self::Interpolate => interpolate(values, &result.outlier_indices),
            Self::Winsorize => winsorize(values, &result.outlier_indices),
        }
    }
}

fn interpolate(values: &[f64], flagged: &[usize]) -> Vec<f64> {
    let mut out = values.to_vec();
    let flagged_set: std::collections::HashSet<usize> = flagged.iter().copied().collect();
    for &idx in flagged {
        let prev = (0..idx).rev().find(|i| !flagged_set.contains(i)).map(|i| values[i]);
        let next = (idx + 1..values.len()).find(|i| !flagged_set.contains(i)).map(|i| values[i]);
        out[idx] = match (prev, next) {
            (Some(p), Some(n)) => (p + n) / 2.0,
            (Some(p), None) => p,
            (None, Some(n)) => n,
            (None, None) => values[idx],
        };
    }
    out
}

fn winsorize(values: &[f64], flagged: &[usize]) -> Vec<f64> {
    let (lower, upper) = iqr_bounds(values, 1.5);
    let mut out = values.to_vec();
    for &idx in flagged {
        out[idx] = out[idx].clamp(lower, upper);
    }
    out
}
