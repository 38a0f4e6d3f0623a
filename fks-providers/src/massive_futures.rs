//! Polygon-aggregates-shaped futures microstructure adapter, covering the
//! `aggs` endpoint (`trades`/`quotes` share the same contract but are out of
//! scope for this adapter's single endpoint).

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::{resolve_key, timestamp::normalize_epoch};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, FuturesEvent, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.massive.com/futures/vX/aggs";

/// Adapter for the futures aggregates endpoint (`/futures/vX/aggs/{ticker}`).
pub struct MassiveFuturesAdapter;

#[async_trait]
impl ProviderAdapter for MassiveFuturesAdapter {
    fn name(&self) -> &'static str {
        "massive_futures"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(4.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(
            &["MASSIVE_API_KEY", "FKS_MASSIVE_API_KEY", "POLYGON_API_KEY"],
            None,
            "massive_futures",
        )
        .ok_or_else(|| {
            FksError::Config(
                "MASSIVE_API_KEY (or FKS_MASSIVE_API_KEY / POLYGON_API_KEY) not found".to_string(),
            )
        })?;
        let mut query = vec![
            ("apiKey".to_string(), api_key),
            ("resolution".to_string(), request.interval.clone()),
            (
                "limit".to_string(),
                request.limit.unwrap_or(5000).to_string(),
            ),
        ];
        if let Some(start) = request.start {
            query.push(("window_start.gte".to_string(), (start * 1_000_000_000).to_string()));
        }
        if let Some(end) = request.end {
            query.push(("window_start.lte".to_string(), (end * 1_000_000_000).to_string()));
        }
        Ok(HttpRequestSpec {
            url: format!("{BASE_URL}/{}", request.symbol),
            query,
            headers: vec![],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let results = raw.get("results").and_then(serde_json::Value::as_array).ok_or_else(|| {
            FksError::Validation {
                provider: self.name().to_string(),
                message: "expected a results array".to_string(),
            }
        })?;

        let mut data = Vec::with_capacity(results.len());
        for item in results {
            let Some(event) = parse_agg(item) else { continue };
            data.push(NormalizedRow::Event(event));
        }

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
}

fn parse_agg(item: &serde_json::Value) -> Option<FuturesEvent> {
    let window_start = item.get("window_start")?.as_i64()?;
    let bar = MarketBar {
        ts: normalize_epoch(window_start),
        open: item.get("open")?.as_f64()?,
        high: item.get("high")?.as_f64()?,
        low: item.get("low")?.as_f64()?,
        close: item.get("close")?.as_f64()?,
        volume: item.get("volume").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
    };
    if !bar.is_valid() {
        return None;
    }
    Some(FuturesEvent::Agg {
        bar,
        transactions: item.get("transactions").and_then(serde_json::Value::as_u64),
        dollar_volume: item.get("dollar_volume").and_then(serde_json::Value::as_f64),
        settlement_price: item.get("settlement_price").and_then(serde_json::Value::as_f64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    // Serializes the two env-mutating tests below; std::env is process-global
    // and cargo runs tests in this file on separate threads by default.
    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "ESZ24".to_string(),
            interval: "1h".to_string(),
            start: Some(1_732_636_800),
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        unsafe {
            std::env::remove_var("MASSIVE_API_KEY");
            std::env::remove_var("FKS_MASSIVE_API_KEY");
            std::env::remove_var("POLYGON_API_KEY");
        }
        let adapter = MassiveFuturesAdapter;
        let err = adapter.build_request(&req()).unwrap_err();
        assert!(matches!(err, FksError::Config(_)));
    }

    #[test]
    fn build_request_converts_window_start_to_nanoseconds() {
        let _guard = ENV_GUARD.lock().unwrap();
        unsafe {
            std::env::set_var("FKS_MASSIVE_API_KEY", "test-key");
        }
        let adapter = MassiveFuturesAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec
            .query
            .contains(&("window_start.gte".to_string(), "1732636800000000000".to_string())));
        unsafe {
            std::env::remove_var("FKS_MASSIVE_API_KEY");
        }
    }

    #[test]
    fn normalizes_aggs_into_futures_agg_events() {
        let adapter = MassiveFuturesAdapter;
        let raw = serde_json::json!({
            "results": [
                {
                    "window_start": 1732636800000000000_i64,
                    "open": 5900.0,
                    "high": 5910.0,
                    "low": 5890.0,
                    "close": 5905.0,
                    "volume": 1200,
                    "transactions": 340,
                    "dollar_volume": 7_086_000.0,
                }
            ]
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Event(FuturesEvent::Agg { bar, transactions, .. }) => {
                assert_eq!(bar.ts, 1_732_636_800);
                assert_eq!(*transactions, Some(340));
            }
            other => panic!("expected Event::Agg, got {other:?}"),
        }
    }
}
