//! Finnhub-shaped bar/kline adapter: authenticated `/stock/candle` endpoint,
//! which replies with parallel columnar arrays rather than row objects.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::resolve_key;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://finnhub.io/api/v1/stock/candle";

/// Adapter for Finnhub's `/stock/candle` endpoint.
pub struct FinnhubAdapter;

#[async_trait]
impl ProviderAdapter for FinnhubAdapter {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(1.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(&["FINNHUB_API_KEY", "FKS_FINNHUB_API_KEY"], None, "finnhub")
            .ok_or_else(|| FksError::Config("FINNHUB_API_KEY not found in environment".to_string()))?;
        let to = request.end.unwrap_or(0);
        let from = request.start.unwrap_or(to.saturating_sub(365 * 24 * 60 * 60));
        Ok(HttpRequestSpec {
            url: BASE_URL.to_string(),
            query: vec![
                ("symbol".to_string(), request.symbol.to_uppercase()),
                ("resolution".to_string(), resolution_for(&request.interval).to_string()),
                ("from".to_string(), from.to_string()),
                ("to".to_string(), to.to_string()),
                ("token".to_string(), api_key),
            ],
            headers: vec![],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let obj = raw.as_object().ok_or_else(|| FksError::Validation {
            provider: self.name().to_string(),
            message: "expected a JSON object".to_string(),
        })?;

        match obj.get("s").and_then(serde_json::Value::as_str) {
            Some("no_data") => {
                return Ok(CanonicalFetchResult {
                    provider: self.name().to_string(),
                    data: vec![],
                    request: request.clone(),
                })
            }
            Some("ok") => {}
            _ => {
                return Err(FksError::Validation {
                    provider: self.name().to_string(),
                    message: "Finnhub reported a non-ok status".to_string(),
                })
            }
        }

        let arr = |key: &str| obj.get(key).and_then(serde_json::Value::as_array).cloned().unwrap_or_default();
        let (t, o, h, l, c, v) = (arr("t"), arr("o"), arr("h"), arr("l"), arr("c"), arr("v"));
        let n = t.len();
        if [&o, &h, &l, &c, &v].iter().any(|a| a.len() != n) {
            return Err(FksError::Validation {
                provider: self.name().to_string(),
                message: "mismatched column array lengths".to_string(),
            });
        }

        let mut data = Vec::with_capacity(n);
        for i in 0..n {
            let row = (|| {
                Some(MarketBar {
                    ts: t[i].as_i64()?,
                    open: o[i].as_f64()?,
                    high: h[i].as_f64()?,
                    low: l[i].as_f64()?,
                    close: c[i].as_f64()?,
                    volume: v[i].as_f64()?,
                })
            })();
            let Some(bar) = row else { continue };
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

fn resolution_for(interval: &str) -> &'static str {
    match interval {
        "1m" => "1",
        "5m" => "5",
        "15m" => "15",
        "30m" => "30",
        "1h" | "60m" => "60",
        "1w" => "W",
        "1M" => "M",
        _ => "D",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "aapl".to_string(),
            interval: "1d".to_string(),
            start: Some(1_700_000_000),
            end: Some(1_732_579_200),
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        unsafe {
            std::env::remove_var("FINNHUB_API_KEY");
            std::env::remove_var("FKS_FINNHUB_API_KEY");
        }
        let adapter = FinnhubAdapter;
        assert!(matches!(
            adapter.build_request(&req()).unwrap_err(),
            FksError::Config(_)
        ));
    }

    #[test]
    fn normalizes_columnar_candle_arrays() {
        let adapter = FinnhubAdapter;
        let raw = serde_json::json!({
            "s": "ok",
            "t": [1732579200_i64],
            "o": [100.0],
            "h": [101.0],
            "l": [99.0],
            "c": [100.5],
            "v": [1000.0],
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
    }

    #[test]
    fn no_data_status_yields_empty_without_error() {
        let adapter = FinnhubAdapter;
        let result = adapter.normalize(serde_json::json!({"s": "no_data"}), &req()).unwrap();
        assert!(result.data.is_empty());
    }

    #[test]
    fn mismatched_column_lengths_fail_structurally() {
        let adapter = FinnhubAdapter;
        let raw = serde_json::json!({"s": "ok", "t": [1, 2], "o": [1.0], "h": [], "l": [], "c": [], "v": []});
        assert!(adapter.normalize(raw, &req()).is_err());
    }
}
