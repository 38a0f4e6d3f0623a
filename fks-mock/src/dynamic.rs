//! A controllable [`Fetcher`] whose behavior is driven by an external
//! [`DynamicMockController`] rather than static fixtures. Used to exercise
//! the manager's failover/circuit-breaker/verification logic against
//! scripted sequences (consecutive failures, a slow provider, a provider
//! that comes back healthy) without real network flakiness.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use fks_manager::Fetcher;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError};
use tokio::sync::Mutex;

/// Instruction for how `fetch` should behave for a given symbol.
#[derive(Clone)]
pub enum MockBehavior {
    /// Return the given result immediately.
    Return(CanonicalFetchResult),
    /// Fail immediately with the given error.
    Fail(FksError),
    /// Hang indefinitely (simulate a stalled upstream).
    Hang,
}

#[derive(Default)]
struct InternalState {
    rules: HashMap<String, MockBehavior>,
    call_log: Vec<String>,
}

/// Controller handle used by tests to drive a [`DynamicMockFetcher`] from
/// the outside.
#[derive(Clone)]
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Set the behavior for `fetch` calls against `symbol`.
    pub async fn set_behavior(&self, symbol: impl Into<String>, behavior: MockBehavior) {
        let mut guard = self.state.lock().await;
        guard.rules.insert(symbol.into(), behavior);
    }

    /// Return the symbols this fetcher has been called with, in call order.
    pub async fn call_log(&self) -> Vec<String> {
        self.state.lock().await.call_log.clone()
    }

    /// Clear all configured behaviors and the call log.
    pub async fn reset(&self) {
        let mut guard = self.state.lock().await;
        guard.rules.clear();
        guard.call_log.clear();
    }
}

/// A [`Fetcher`] that defers all behavior to an external controller.
pub struct DynamicMockFetcher {
    name: &'static str,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockFetcher {
    /// Create a new dynamic mock fetcher and its controller.
    #[must_use]
    pub fn new_with_controller(name: &'static str) -> (Self, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        (Self { name, state }, controller)
    }
}

#[async_trait]
impl Fetcher for DynamicMockFetcher {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.call_log.push(request.symbol.clone());
            guard.rules.get(&request.symbol).cloned()
        };
        match behavior {
            Some(MockBehavior::Return(result)) => Ok(result),
            Some(MockBehavior::Fail(err)) => Err(err),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(FksError::not_found(format!(
                "{} has no scripted behavior for {}",
                self.name, request.symbol
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fks_types::{MarketBar, NormalizedRow};

    fn req(symbol: &str) -> FetchRequest {
        FetchRequest {
            symbol: symbol.to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    fn bar_result(provider: &str, request: &FetchRequest, close: f64) -> CanonicalFetchResult {
        CanonicalFetchResult {
            provider: provider.to_string(),
            data: vec![NormalizedRow::Bar(MarketBar {
                ts: 1,
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })],
            request: request.clone(),
        }
    }

    #[tokio::test]
    async fn scripted_return_is_honored() {
        let (fetcher, controller) = DynamicMockFetcher::new_with_controller("dyn-a");
        let r = req("XYZ");
        controller
            .set_behavior("XYZ", MockBehavior::Return(bar_result("dyn-a", &r, 10.0)))
            .await;
        let result = fetcher.fetch(&r).await.unwrap();
        assert_eq!(result.provider, "dyn-a");
    }

    #[tokio::test]
    async fn scripted_fail_propagates_configured_error() {
        let (fetcher, controller) = DynamicMockFetcher::new_with_controller("dyn-a");
        let r = req("XYZ");
        controller
            .set_behavior("XYZ", MockBehavior::Fail(FksError::provider_timeout("dyn-a", "fetch")))
            .await;
        let err = fetcher.fetch(&r).await.unwrap_err();
        assert!(matches!(err, FksError::ProviderTimeout { .. }));
    }

    #[tokio::test]
    async fn unscripted_symbol_is_not_found_and_logged() {
        let (fetcher, controller) = DynamicMockFetcher::new_with_controller("dyn-a");
        let r = req("UNSET");
        let err = fetcher.fetch(&r).await.unwrap_err();
        assert!(matches!(err, FksError::NotFound { .. }));
        assert_eq!(controller.call_log().await, vec!["UNSET".to_string()]);
    }
}
