//! Polygon-shaped bar/kline adapter: authenticated stocks/crypto aggregates
//! endpoint (`/v2/aggs/ticker/{ticker}/range/{range}/{timespan}/{from}/{to}`).
//! Distinct from `MassiveFuturesAdapter`, which covers the futures-specific
//! `futures/vX/aggs` shape.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::{resolve_key, timestamp::normalize_epoch};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.polygon.io";

/// Adapter for Polygon's `/v2/aggs/ticker/{ticker}/range/...` endpoint.
pub struct PolygonAdapter;

#[async_trait]
impl ProviderAdapter for PolygonAdapter {
    fn name(&self) -> &'static str {
        "polygon"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(4.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(&["POLYGON_API_KEY", "FKS_POLYGON_API_KEY"], None, "polygon")
            .ok_or_else(|| FksError::Config("POLYGON_API_KEY not found in environment".to_string()))?;
        let start = request.start.unwrap_or(0);
        let end = request.end.unwrap_or(start);
        let path = format!(
            "{BASE_URL}/v2/aggs/ticker/{}/range/1/{}/{}/{}",
            request.symbol,
            timespan_for(&request.interval),
            start * 1000,
            end * 1000,
        );
        Ok(HttpRequestSpec {
            url: path,
            query: vec![
                ("adjusted".to_string(), "true".to_string()),
                ("sort".to_string(), "asc".to_string()),
                (
                    "limit".to_string(),
                    request.limit.unwrap_or(50_000).to_string(),
                ),
            ],
            headers: vec![("Authorization".to_string(), format!("Bearer {api_key}"))],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let obj = raw.as_object().ok_or_else(|| FksError::Validation {
            provider: self.name().to_string(),
            message: "expected a JSON object with a results array".to_string(),
        })?;

        let mut data = Vec::new();
        if let Some(results) = obj.get("results").and_then(serde_json::Value::as_array) {
            for item in results {
                let Some(bar) = parse_agg(item) else { continue };
                if bar.is_valid() {
                    data.push(NormalizedRow::Bar(bar));
                }
            }
        }

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
}

fn timespan_for(interval: &str) -> &'static str {
    match interval {
        "1m" | "1min" => "minute",
        "1h" | "60m" => "hour",
        "1w" => "week",
        "1M" => "month",
        _ => "day",
    }
}

fn parse_agg(item: &serde_json::Value) -> Option<MarketBar> {
    let ts_ms = item.get("t")?.as_i64()?;
    Some(MarketBar {
        ts: normalize_epoch(ts_ms),
        open: item.get("o")?.as_f64()?,
        high: item.get("h")?.as_f64()?,
        low: item.get("l")?.as_f64()?,
        close: item.get("c")?.as_f64()?,
        volume: item.get("v").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "AAPL".to_string(),
            interval: "1d".to_string(),
            start: Some(1_732_579_200),
            end: Some(1_732_665_600),
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        unsafe {
            std::env::remove_var("POLYGON_API_KEY");
            std::env::remove_var("FKS_POLYGON_API_KEY");
        }
        let adapter = PolygonAdapter;
        assert!(matches!(
            adapter.build_request(&req()).unwrap_err(),
            FksError::Config(_)
        ));
    }

    #[test]
    fn build_request_uses_millisecond_range_path() {
        unsafe {
            std::env::set_var("FKS_POLYGON_API_KEY", "test-key");
        }
        let adapter = PolygonAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec.url.contains("/range/1/day/1732579200000/1732665600000"));
        unsafe {
            std::env::remove_var("FKS_POLYGON_API_KEY");
        }
    }

    #[test]
    fn normalizes_results_into_bars() {
        let adapter = PolygonAdapter;
        let raw = serde_json::json!({
            "results": [
                {"t": 1732579200000_i64, "o": 100.0, "h": 101.0, "l": 99.0, "c": 100.5, "v": 1000.0}
            ]
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => assert_eq!(bar.ts, 1_732_579_200),
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn missing_results_yields_empty_not_error() {
        let adapter = PolygonAdapter;
        let result = adapter.normalize(serde_json::json!({"status": "OK"}), &req()).unwrap();
        assert!(result.data.is_empty());
    }
}
