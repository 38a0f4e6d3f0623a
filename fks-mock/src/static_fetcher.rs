//! A static, fixture-backed [`Fetcher`] for CI-safe tests and examples.
//!
//! Deterministic data keyed by symbol, plus the `FAIL`/`TIMEOUT` symbol
//! conventions used throughout this workspace's tests to force an error
//! or simulate provider latency without a network.

use async_trait::async_trait;
use fks_manager::Fetcher;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError};

use crate::fixtures;

/// Which row family a [`StaticMockFetcher`] serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFamily {
    /// Bar/kline rows (`fixtures::bar`).
    Bar,
    /// Quote/ticker rows (`fixtures::quote`).
    Quote,
    /// Fundamentals/time-series rows (`fixtures::series`).
    Series,
    /// Futures microstructure events (`fixtures::event`).
    Event,
}

/// Fixture-backed provider stand-in. Returns deterministic data for known
/// symbols, `FksError::NotFound` for unknown ones, and honors `FAIL`/
/// `TIMEOUT` as symbol conventions for forced-failure and latency tests.
pub struct StaticMockFetcher {
    name: &'static str,
    family: RowFamily,
}

impl StaticMockFetcher {
    /// Construct a mock fetcher named `name`, serving fixtures from `family`.
    #[must_use]
    pub const fn new(name: &'static str, family: RowFamily) -> Self {
        Self { name, family }
    }

    async fn maybe_fail_or_timeout(&self, symbol: &str) -> Result<(), FksError> {
        match symbol {
            "FAIL" => Err(FksError::data_fetch(self.name, "forced failure")),
            "TIMEOUT" => {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn fixture_rows(&self, symbol: &str) -> Option<Vec<fks_types::NormalizedRow>> {
        match self.family {
            RowFamily::Bar => fixtures::bar::by_symbol(symbol),
            RowFamily::Quote => fixtures::quote::by_symbol(symbol),
            RowFamily::Series => fixtures::series::by_symbol(symbol),
            RowFamily::Event => fixtures::event::by_symbol(symbol),
        }
    }
}

#[async_trait]
impl Fetcher for StaticMockFetcher {
    fn provider_name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
        self.maybe_fail_or_timeout(&request.symbol).await?;
        let data = self
            .fixture_rows(&request.symbol)
            .ok_or_else(|| FksError::not_found(format!("{} fixture for {}", self.name, request.symbol)))?;
        Ok(CanonicalFetchResult {
            provider: self.name.to_string(),
            data,
            request: request.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(symbol: &str) -> FetchRequest {
        FetchRequest {
            symbol: symbol.to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn returns_fixture_for_known_symbol() {
        let fetcher = StaticMockFetcher::new("mock-binance", RowFamily::Bar);
        let result = fetcher.fetch(&req("BTCUSDT")).await.unwrap();
        assert_eq!(result.data.len(), 3);
        assert!(result.is_monotonic());
    }

    #[tokio::test]
    async fn unknown_symbol_is_not_found() {
        let fetcher = StaticMockFetcher::new("mock-binance", RowFamily::Bar);
        let err = fetcher.fetch(&req("NOPE")).await.unwrap_err();
        assert!(matches!(err, FksError::NotFound { .. }));
    }

    #[tokio::test]
    async fn fail_symbol_forces_error() {
        let fetcher = StaticMockFetcher::new("mock-binance", RowFamily::Bar);
        let err = fetcher.fetch(&req("FAIL")).await.unwrap_err();
        assert!(matches!(err, FksError::DataFetch { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_symbol_delays_but_succeeds_against_same_provider() {
        let fetcher = StaticMockFetcher::new("mock-binance", RowFamily::Bar);
        let handle = tokio::spawn(async move { fetcher.fetch(&req("TIMEOUT")).await });
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, FksError::NotFound { .. }));
    }
}
