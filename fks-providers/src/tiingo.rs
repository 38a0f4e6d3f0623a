//! Tiingo-shaped bar/kline adapter: authenticated end-of-day prices endpoint
//! (`/tiingo/daily/{ticker}/prices`), which replies with an array of row
//! objects keyed by ISO date.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::{parse_iso_or_date, resolve_key};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.tiingo.com/tiingo/daily";

/// Adapter for Tiingo's `/tiingo/daily/{ticker}/prices` endpoint.
pub struct TiingoAdapter;

#[async_trait]
impl ProviderAdapter for TiingoAdapter {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(2.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(&["TIINGO_API_KEY", "FKS_TIINGO_API_KEY"], None, "tiingo")
            .ok_or_else(|| FksError::Config("TIINGO_API_KEY not found in environment".to_string()))?;
        Ok(HttpRequestSpec {
            url: format!("{BASE_URL}/{}/prices", request.symbol.to_uppercase()),
            query: vec![("format".to_string(), "json".to_string())],
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Authorization".to_string(), format!("Token {api_key}")),
            ],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let rows = raw.as_array().ok_or_else(|| FksError::Validation {
            provider: self.name().to_string(),
            message: "expected a top-level array of price rows".to_string(),
        })?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(bar) = parse_row(row) else { continue };
            if bar.is_valid() {
                data.push(NormalizedRow::Bar(bar));
            }
        }

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
}

fn parse_row(row: &serde_json::Value) -> Option<MarketBar> {
    let date = row.get("date")?.as_str()?;
    let ts = parse_iso_or_date(date.trim_end_matches("T00:00:00.000Z"))
        .or_else(|| parse_iso_or_date(date))?;
    Some(MarketBar {
        ts,
        open: row.get("open")?.as_f64()?,
        high: row.get("high")?.as_f64()?,
        low: row.get("low")?.as_f64()?,
        close: row.get("close")?.as_f64()?,
        volume: row.get("volume").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "aapl".to_string(),
            interval: "1d".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        unsafe {
            std::env::remove_var("TIINGO_API_KEY");
            std::env::remove_var("FKS_TIINGO_API_KEY");
        }
        let adapter = TiingoAdapter;
        assert!(matches!(
            adapter.build_request(&req()).unwrap_err(),
            FksError::Config(_)
        ));
    }

    #[test]
    fn build_request_attaches_token_header() {
        unsafe {
            std::env::set_var("FKS_TIINGO_API_KEY", "test-key");
        }
        let adapter = TiingoAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec
            .headers
            .contains(&("Authorization".to_string(), "Token test-key".to_string())));
        unsafe {
            std::env::remove_var("FKS_TIINGO_API_KEY");
        }
    }

    #[test]
    fn normalizes_iso_dated_price_rows() {
        let adapter = TiingoAdapter;
        let raw = serde_json::json!([
            {"date": "2024-11-26T00:00:00.000Z", "open": 100.0, "high": 101.0, "low": 99.0, "close": 100.5, "volume": 5000.0}
        ]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => assert_eq!(bar.ts, 1_732_579_200),
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_array_payload() {
        let adapter = TiingoAdapter;
        let err = adapter.normalize(serde_json::json!({"detail": "not found"}), &req()).unwrap_err();
        assert!(matches!(err, FksError::Validation { .. }));
    }
}
