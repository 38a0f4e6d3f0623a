//! The multi-provider manager: priority-ordered failover across
//! providers with per-provider circuit breakers and an optional
//! cross-source verification step.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fks_core::Adapter;
use fks_core::adapter::ProviderAdapter;
use fks_types::config::{CircuitBreakerConfig, VerificationConfig};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, NormalizedRow, ProviderHealth};
use tokio::sync::Mutex;

use crate::circuit::CircuitState;

/// Object-safe fetch capability implemented by every wrapped adapter,
/// letting the manager hold a priority-ordered `Vec` of heterogeneous
/// provider adapters.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Stable provider name.
    fn provider_name(&self) -> &'static str;
    /// Run the adapter's full fetch lifecycle.
    async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError>;
}

#[async_trait]
impl<A: ProviderAdapter> Fetcher for Adapter<A> {
    fn provider_name(&self) -> &'static str {
        self.name()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
        Adapter::fetch(self, request).await
    }
}

/// The latest close-equivalent price in a fetch result, used by the
/// verification step. Returns `None` for an empty result.
#[must_use]
pub fn latest_close(result: &CanonicalFetchResult) -> Option<f64> {
    result.data.last().map(|row| match row {
        NormalizedRow::Bar(b) => b.close,
        NormalizedRow::Quote(q) => q.price,
        NormalizedRow::Series(s) => s.value,
        NormalizedRow::Event(fks_types::FuturesEvent::Agg { bar, .. }) => bar.close,
        NormalizedRow::Event(fks_types::FuturesEvent::Trade { price, .. }) => *price,
        NormalizedRow::Event(fks_types::FuturesEvent::Quote { bid_price, ask_price, .. }) => {
            (bid_price + ask_price) / 2.0
        }
    })
}

struct Registered {
    fetcher: Arc<dyn Fetcher>,
    circuit: Mutex<CircuitState>,
    health: Mutex<ProviderHealth>,
}

/// Orchestrates a priority-ordered list of provider adapters for one asset
/// class, with per-provider circuit breakers and optional cross-source
/// verification.
pub struct MultiProviderManager {
    providers: Vec<Registered>,
    circuit_cfg: CircuitBreakerConfig,
    verification_cfg: VerificationConfig,
}

impl MultiProviderManager {
    /// Build a manager from a priority-ordered list of fetchers (highest
    /// priority first).
    #[must_use]
    pub fn new(
        providers: Vec<Arc<dyn Fetcher>>,
        circuit_cfg: CircuitBreakerConfig,
        verification_cfg: VerificationConfig,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|fetcher| {
                let name = fetcher.provider_name();
                Registered {
                    fetcher,
                    circuit: Mutex::new(CircuitState::default()),
                    health: Mutex::new(ProviderHealth::new(name)),
                }
            })
            .collect();
        Self {
            providers,
            circuit_cfg,
            verification_cfg,
        }
    }

    /// Snapshot of every provider's health, for `/health` reporting.
    pub async fn health_snapshot(&self) -> Vec<ProviderHealth> {
        let mut out = Vec::with_capacity(self.providers.len());
        for p in &self.providers {
            out.push(p.health.lock().await.clone());
        }
        out
    }

    /// Fetch `request`, trying each registered provider in priority order.
    ///
    /// # Errors
    /// Returns `FksError::AllProvidersFailed` if every provider is skipped
    /// (circuit open) or fails.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
        let mut errors = Vec::new();

        for idx in 0..self.providers.len() {
            let entry = &self.providers[idx];
            {
                let mut circuit = entry.circuit.lock().await;
                if circuit.should_skip(&self.circuit_cfg) {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(provider = entry.fetcher.provider_name(), "circuit open, skipping");
                    continue;
                }
                if circuit.is_open() {
                    // Past cooldown: this is the half-open trial.
                    circuit.begin_half_open_trial();
                }
            }

            match entry.fetcher.fetch(request).await {
                Ok(result) => {
                    if self.should_verify(idx) {
                        if let Some(secondary_idx) = self.pick_verification_secondary(idx).await {
                            match self.verify(&result, secondary_idx, request).await {
                                VerificationOutcome::Confirmed | VerificationOutcome::Indeterminate => {
                                    self.record_success(idx).await;
                                    return Ok(result);
                                }
                                VerificationOutcome::Mismatch(msg) => {
                                    self.record_failure(idx).await;
                                    errors.push(FksError::Verification {
                                        provider: entry.fetcher.provider_name().to_string(),
                                        message: msg,
                                    });
                                    continue;
                                }
                            }
                        }
                    }
                    self.record_success(idx).await;
                    return Ok(result);
                }
                Err(e) => {
                    self.record_failure(idx).await;
                    errors.push(e);
                }
            }
        }

        Err(FksError::AllProvidersFailed(errors))
    }

    fn should_verify(&self, _primary_idx: usize) -> bool {
        self.verification_cfg.enabled && self.providers.len() > 1
    }

    async fn pick_verification_secondary(&self, primary_idx: usize) -> Option<usize> {
        for (idx, entry) in self.providers.iter().enumerate() {
            if idx == primary_idx {
                continue;
            }
            let circuit = entry.circuit.lock().await;
            if !circuit.should_skip(&self.circuit_cfg) {
                return Some(idx);
            }
        }
        None
    }

    async fn verify(
        &self,
        primary_result: &CanonicalFetchResult,
        secondary_idx: usize,
        request: &FetchRequest,
    ) -> VerificationOutcome {
        let secondary = &self.providers[secondary_idx];
        let secondary_result = match secondary.fetcher.fetch(request).await {
            Ok(r) => r,
            Err(_) => return VerificationOutcome::Indeterminate,
        };
        let Some(secondary_close) = latest_close(&secondary_result) else {
            return VerificationOutcome::Indeterminate;
        };
        if secondary_close == 0.0 {
            return VerificationOutcome::Indeterminate;
        }
        let Some(primary_close) = latest_close(primary_result) else {
            return VerificationOutcome::Indeterminate;
        };
        let variance = ((primary_close - secondary_close) / secondary_close).abs();
        if variance > self.verification_cfg.tolerance {
            VerificationOutcome::Mismatch(format!(
                "primary={primary_close} secondary={secondary_close} variance={variance:.4}"
            ))
        } else {
            VerificationOutcome::Confirmed
        }
    }

    async fn record_success(&self, idx: usize) {
        let entry = &self.providers[idx];
        entry.circuit.lock().await.record_success();
        let mut health = entry.health.lock().await;
        health.failures = 0;
        health.circuit_open = false;
        health.circuit_open_at = None;
        health.last_success = Some(Utc::now());
    }

    async fn record_failure(&self, idx: usize) {
        let entry = &self.providers[idx];
        let mut circuit = entry.circuit.lock().await;
        circuit.record_failure(&self.circuit_cfg);
        let is_open = circuit.is_open();
        drop(circuit);
        let mut health = entry.health.lock().await;
        health.failures += 1;
        health.last_failure = Some(Utc::now());
        if is_open && !health.circuit_open {
            health.circuit_open = true;
            health.circuit_open_at = Some(Utc::now());
        }
    }
}

enum VerificationOutcome {
    Confirmed,
    Indeterminate,
    Mismatch(String),
}

/// Convenience accessor for per-provider raw counters, used by admin/metrics
/// surfaces that want more than the coarse `ProviderHealth` snapshot.
pub async fn failure_counts(manager: &MultiProviderManager) -> HashMap<String, u32> {
    let mut out = HashMap::new();
    for p in &manager.providers {
        let health = p.health.lock().await;
        out.insert(health.name.clone(), health.failures);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fks_types::MarketBar;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedFetcher {
        name: &'static str,
        close: f64,
        fail_next_n: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
            if self.fail_next_n.load(Ordering::SeqCst) > 0 {
                self.fail_next_n.fetch_sub(1, Ordering::SeqCst);
                return Err(FksError::data_fetch(self.name, "scripted failure"));
            }
            Ok(CanonicalFetchResult {
                provider: self.name.to_string(),
                data: vec![NormalizedRow::Bar(MarketBar {
                    ts: request.start.unwrap_or(0),
                    open: self.close,
                    high: self.close,
                    low: self.close,
                    close: self.close,
                    volume: 1.0,
                })],
                request: request.clone(),
            })
        }
    }

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            start: Some(0),
            end: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn failover_opens_circuit_and_uses_secondary() {
        let a = Arc::new(ScriptedFetcher {
            name: "A",
            close: 100.0,
            fail_next_n: AtomicUsize::new(10),
        });
        let b = Arc::new(ScriptedFetcher {
            name: "B",
            close: 100.0,
            fail_next_n: AtomicUsize::new(0),
        });
        let manager = MultiProviderManager::new(
            vec![a.clone(), b.clone()],
            CircuitBreakerConfig {
                failure_threshold: 3,
                cooldown: Duration::from_millis(20),
            },
            VerificationConfig {
                enabled: true,
                tolerance: 0.01,
            },
        );

        // First three requests: A fails three times, opening its circuit;
        // each falls through to B.
        for _ in 0..3 {
            let result = manager.fetch(&req()).await.unwrap();
            assert_eq!(result.provider, "B");
        }

        // A fourth immediate request skips A (circuit open) and goes
        // straight to B.
        let result = manager.fetch(&req()).await.unwrap();
        assert_eq!(result.provider, "B");

        let snapshot = manager.health_snapshot().await;
        let a_health = snapshot.iter().find(|h| h.name == "A").unwrap();
        assert!(a_health.circuit_open);

        // After the cooldown elapses, A gets a half-open trial; make it
        // succeed this time.
        tokio::time::sleep(Duration::from_millis(30)).await;
        a.fail_next_n.store(0, Ordering::SeqCst);
        let result = manager.fetch(&req()).await.unwrap();
        assert_eq!(result.provider, "A");

        let snapshot = manager.health_snapshot().await;
        let a_health = snapshot.iter().find(|h| h.name == "A").unwrap();
        assert!(!a_health.circuit_open);
    }

    #[tokio::test]
    async fn verification_mismatch_falls_through_to_next_provider() {
        let a = Arc::new(ScriptedFetcher {
            name: "A",
            close: 100.0,
            fail_next_n: AtomicUsize::new(0),
        });
        let b = Arc::new(ScriptedFetcher {
            name: "B",
            close: 150.0, // 50% off from A: exceeds 1% tolerance
            fail_next_n: AtomicUsize::new(0),
        });
        let manager = MultiProviderManager::new(
            vec![a, b],
            CircuitBreakerConfig::default(),
            VerificationConfig {
                enabled: true,
                tolerance: 0.01,
            },
        );
        // A succeeds, but verification against B exceeds tolerance, so A's
        // result is rejected and the manager falls through to return B's.
        let result = manager.fetch(&req()).await.unwrap();
        assert_eq!(result.provider, "B");
    }

    #[tokio::test]
    async fn single_provider_skips_verification() {
        let a = Arc::new(ScriptedFetcher {
            name: "A",
            close: 100.0,
            fail_next_n: AtomicUsize::new(0),
        });
        let manager = MultiProviderManager::new(
            vec![a],
            CircuitBreakerConfig::default(),
            VerificationConfig {
                enabled: true,
                tolerance: 0.01,
            },
        );
        let result = manager.fetch(&req()).await.unwrap();
        assert_eq!(result.provider, "A");
    }

    #[tokio::test]
    async fn exhaustion_raises_aggregate_with_last_cause() {
        let a = Arc::new(ScriptedFetcher {
            name: "A",
            close: 100.0,
            fail_next_n: AtomicUsize::new(100),
        });
        let b = Arc::new(ScriptedFetcher {
            name: "B",
            close: 100.0,
            fail_next_n: AtomicUsize::new(100),
        });
        let manager = MultiProviderManager::new(
            vec![a, b],
            CircuitBreakerConfig::default(),
            VerificationConfig::default(),
        );
        let err = manager.fetch(&req()).await.unwrap_err();
        match err {
            FksError::AllProvidersFailed(inner) => assert_eq!(inner.len(), 2),
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }
}
