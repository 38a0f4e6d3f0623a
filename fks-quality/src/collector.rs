//! The quality collector: wraps the validators and composite scorer,
//! timing each check and maintaining lightweight in-process metric
//! registers that an operator surface can scrape.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use fks_types::{CompletenessResult, FreshnessResult, OutlierResult, QualityScore, QualityWeights};

use crate::completeness::{self, CompletenessConfig};
use crate::composite;
use crate::freshness::{self, FreshnessConfig};
use crate::outlier::{self, OutlierDetectorConfig};

/// One symbol's worth of input the collector needs to run a full quality
/// check: OHLCV bars plus the per-field series to feed the outlier
/// detector.
pub struct QualityInput<'a> {
    /// Bars used for completeness and freshness checks, sorted ascending by
    /// `ts`.
    pub bars: &'a [fks_types::MarketBar],
    /// Expected sampling frequency label (`1m`, `1h`, ...).
    pub frequency: &'a str,
    /// Wall-clock "now" in unix seconds, for freshness aging.
    pub now: i64,
}

fn field_series(bars: &[fks_types::MarketBar], field: &str) -> Vec<f64> {
    match field {
        "open" => bars.iter().map(|b| b.open).collect(),
        "high" => bars.iter().map(|b| b.high).collect(),
        "low" => bars.iter().map(|b| b.low).collect(),
        "close" => bars.iter().map(|b| b.close).collect(),
        "volume" => bars.iter().map(|b| b.volume).collect(),
        _ => Vec::new(),
    }
}

const OUTLIER_FIELDS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// In-process metric registers updated after each quality check. No
/// external metrics backend is wired up; an admin surface can read these
/// counters directly the way [`fks_manager`](../fks_manager/index.html)
/// exposes provider health.
#[derive(Default)]
pub struct QualityMetrics {
    checks_total: AtomicU64,
    checks_failed: AtomicU64,
    outliers_flagged_total: AtomicU64,
    stale_events_total: AtomicU64,
    check_duration_micros_sum: AtomicU64,
    last_scores: Mutex<HashMap<String, f64>>,
}

impl QualityMetrics {
    fn record(&self, symbol: &str, score: &QualityScore, outliers: &[OutlierResult], elapsed: std::time::Duration) {
        self.checks_total.fetch_add(1, Ordering::Relaxed);
        self.check_duration_micros_sum.fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        let flagged: usize = outliers.iter().map(|r| r.outlier_count).sum();
        if flagged > 0 {
            self.outliers_flagged_total.fetch_add(flagged as u64, Ordering::Relaxed);
        }
        if !matches!(score.status, fks_types::QualityStatus::Excellent | fks_types::QualityStatus::Good) {
            self.stale_events_total.fetch_add(1, Ordering::Relaxed);
        }
        self.last_scores.lock().unwrap().insert(symbol.to_string(), score.overall);
    }

    fn record_failure(&self) {
        self.checks_total.fetch_add(1, Ordering::Relaxed);
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total checks run, successful and failed.
    #[must_use]
    pub fn checks_total(&self) -> u64 {
        self.checks_total.load(Ordering::Relaxed)
    }

    /// Checks that raised before a score could be computed.
    #[must_use]
    pub fn checks_failed(&self) -> u64 {
        self.checks_failed.load(Ordering::Relaxed)
    }

    /// Cumulative count of points flagged as outliers, across every field
    /// and check.
    #[must_use]
    pub fn outliers_flagged_total(&self) -> u64 {
        self.outliers_flagged_total.load(Ordering::Relaxed)
    }

    /// Count of checks whose composite status was below `Good`.
    #[must_use]
    pub fn stale_events_total(&self) -> u64 {
        self.stale_events_total.load(Ordering::Relaxed)
    }

    /// Average check duration across all recorded checks, in microseconds.
    #[must_use]
    pub fn mean_check_duration_micros(&self) -> f64 {
        let total = self.checks_total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.check_duration_micros_sum.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// The most recent composite score recorded per symbol.
    #[must_use]
    pub fn last_score(&self, symbol: &str) -> Option<f64> {
        self.last_scores.lock().unwrap().get(symbol).copied()
    }
}

/// A sink for persisting composite scores, implemented by the storage
/// layer. The collector never depends on a concrete store.
pub trait QualityScoreSink: Send + Sync {
    /// Persist one symbol's composite score.
    fn store(&self, score: &QualityScore);
}

/// Wraps the three validators and the composite scorer, recording metrics
/// and optionally persisting results after each check.
pub struct QualityCollector {
    outlier_cfg: OutlierDetectorConfig,
    freshness_cfg: FreshnessConfig,
    completeness_cfg: CompletenessConfig,
    weights: QualityWeights,
    metrics: QualityMetrics,
    sink: Option<Box<dyn QualityScoreSink>>,
}

impl QualityCollector {
    /// Build a collector with default validator thresholds and no
    /// persistence sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            outlier_cfg: OutlierDetectorConfig::zscore(),
            freshness_cfg: FreshnessConfig::default(),
            completeness_cfg: CompletenessConfig::default(),
            weights: QualityWeights::default(),
            metrics: QualityMetrics::default(),
            sink: None,
        }
    }

    /// Attach a persistence sink; every successful check is stored after
    /// its metrics are recorded.
    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn QualityScoreSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Override the outlier detector configuration (method/threshold).
    #[must_use]
    pub fn with_outlier_config(mut self, cfg: OutlierDetectorConfig) -> Self {
        self.outlier_cfg = cfg;
        self
    }

    /// Override the composite weighting.
    #[must_use]
    pub fn with_weights(mut self, weights: QualityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// The metric registers accumulated across every check run so far.
    #[must_use]
    pub fn metrics(&self) -> &QualityMetrics {
        &self.metrics
    }

    /// Run a full quality check for one symbol: outlier detection on every
    /// OHLCV field, freshness, completeness, and the composite score.
    /// Always records timing and outcome metrics, even on failure.
    pub fn check_quality(&self, symbol: &str, input: &QualityInput<'_>) -> QualityScore {
        let start = Instant::now();

        let outliers: Vec<OutlierResult> = OUTLIER_FIELDS
            .iter()
            .filter_map(|field| {
                let series = field_series(input.bars, field);
                outlier::detect(field, &series, self.outlier_cfg)
            })
            .collect();

        let timestamps: Vec<i64> = input.bars.iter().map(|b| b.ts).collect();
        let freshness: FreshnessResult =
            freshness::check(symbol, &timestamps, input.frequency, input.now, self.freshness_cfg);
        let completeness: CompletenessResult = completeness::validate(
            symbol,
            input.bars,
            Some(input.frequency),
            self.completeness_cfg,
        );

        let score = composite::score(
            symbol,
            &outliers,
            input.bars.len(),
            &freshness,
            &completeness,
            self.weights,
        );

        self.metrics.record(symbol, &score, &outliers, start.elapsed());
        if let Some(sink) = &self.sink {
            sink.store(&score);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            symbol,
            overall = score.overall,
            duration_us = start.elapsed().as_micros() as u64,
            "quality check completed"
        );

        score
    }

    /// Run [`check_quality`](Self::check_quality) for every entry in
    /// `inputs`, continuing past individual failures. A symbol present in
    /// `inputs` but absent from the returned map had no bars and is
    /// skipped, matching the batch collector's "no data, skip" behavior.
    pub fn check_quality_batch(
        &self,
        inputs: &HashMap<String, QualityInput<'_>>,
    ) -> HashMap<String, QualityScore> {
        let mut results = HashMap::with_capacity(inputs.len());
        for (symbol, input) in inputs {
            if input.bars.is_empty() {
                self.metrics.record_failure();
                #[cfg(feature = "tracing")]
                tracing::warn!(symbol, "no data for symbol, skipping");
                continue;
            }
            results.insert(symbol.clone(), self.check_quality(symbol, input));
        }
        results
    }
}

impl Default for QualityCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fks_types::MarketBar;

    fn bars(n: i64) -> Vec<MarketBar> {
        (0..n)
            .map(|i| MarketBar {
                ts: i * 60,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.0 + i as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn check_quality_records_metrics_and_returns_score() {
        let collector = QualityCollector::new();
        let data = bars(60);
        let input = QualityInput { bars: &data, frequency: "1m", now: 60 * 60 };
        let score = collector.check_quality("BTCUSDT", &input);

        assert!(score.overall > 0.0);
        assert_eq!(collector.metrics().checks_total(), 1);
        assert_eq!(collector.metrics().checks_failed(), 0);
        assert_eq!(collector.metrics().last_score("BTCUSDT"), Some(score.overall));
    }

    #[test]
    fn batch_skips_symbols_with_no_data_but_continues() {
        let collector = QualityCollector::new();
        let good = bars(60);
        let empty: Vec<MarketBar> = vec![];
        let mut inputs = HashMap::new();
        inputs.insert("BTCUSDT".to_string(), QualityInput { bars: &good, frequency: "1m", now: 3_600 });
        inputs.insert("DEAD".to_string(), QualityInput { bars: &empty, frequency: "1m", now: 3_600 });

        let results = collector.check_quality_batch(&inputs);
        assert!(results.contains_key("BTCUSDT"));
        assert!(!results.contains_key("DEAD"));
        assert_eq!(collector.metrics().checks_failed(), 1);
    }

    struct RecordingSink {
        calls: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl QualityScoreSink for RecordingSink {
        fn store(&self, score: &QualityScore) {
            self.calls.lock().unwrap().push(score.symbol.clone());
        }
    }

    #[test]
    fn attached_sink_receives_every_successful_check() {
        let calls = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink { calls: calls.clone() };
        let collector = QualityCollector::new().with_sink(Box::new(sink));
        let data = bars(60);
        let input = QualityInput { bars: &data, frequency: "1m", now: 3_600 };
        collector.check_quality("ETHUSDT", &input);
        assert_eq!(calls.lock().unwrap().as_slice(), ["ETHUSDT".to_string()]);
    }
}
