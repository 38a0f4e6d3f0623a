//! CoinMarketCap-shaped quote/ticker adapter: authenticated `quotes/latest`
//! endpoint.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::resolve_key;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, NormalizedRow, QuoteRow};

const BASE_URL: &str = "https://pro-api.coinmarketcap.com/v1/cryptocurrency/quotes/latest";

/// Adapter for CoinMarketCap's `/cryptocurrency/quotes/latest` endpoint.
pub struct CmcAdapter;

#[async_trait]
impl ProviderAdapter for CmcAdapter {
    fn name(&self) -> &'static str {
        "cmc"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(0.5)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(&["CMC_API_KEY", "FKS_CMC_API_KEY"], None, "cmc")
            .ok_or_else(|| FksError::Config("CMC_API_KEY not found in environment".to_string()))?;
        Ok(HttpRequestSpec {
            url: BASE_URL.to_string(),
            query: vec![
                ("symbol".to_string(), request.symbol.to_uppercase()),
                ("convert".to_string(), "USD".to_string()),
            ],
            headers: vec![
                ("Accepts".to_string(), "application/json".to_string()),
                ("X-CMC_PRO_API_KEY".to_string(), api_key),
            ],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let entries = raw
            .get("data")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| FksError::Validation {
                provider: self.name().to_string(),
                message: "expected a data object keyed by symbol".to_string(),
            })?;

        let mut data = Vec::with_capacity(entries.len());
        for (symbol, item) in entries {
            let Some(quote) = item.get("quote").and_then(|q| q.get("USD")) else { continue };
            let Some(price) = quote.get("price").and_then(serde_json::Value::as_f64) else { continue };
            let ts = item
                .get("last_updated")
                .and_then(serde_json::Value::as_str)
                .and_then(fks_core::parse_iso_or_date)
                .unwrap_or(0);
            data.push(NormalizedRow::Quote(QuoteRow {
                ts,
                symbol: symbol.clone(),
                price,
                volume_24h: quote.get("volume_24h").and_then(serde_json::Value::as_f64),
                market_cap: quote.get("market_cap").and_then(serde_json::Value::as_f64),
                percent_change_24h: quote
                    .get("percent_change_24h")
                    .and_then(serde_json::Value::as_f64),
            }));
        }

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
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
            symbol: "BTC".to_string(),
            interval: "quote".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        let _guard = ENV_GUARD.lock().unwrap();
        // SAFETY: test-local env vars, cleared immediately after, under ENV_GUARD.
        unsafe {
            std::env::remove_var("CMC_API_KEY");
            std::env::remove_var("FKS_CMC_API_KEY");
        }
        let adapter = CmcAdapter;
        let err = adapter.build_request(&req()).unwrap_err();
        assert!(matches!(err, FksError::Config(_)));
    }

    #[test]
    fn build_request_attaches_key_header() {
        let _guard = ENV_GUARD.lock().unwrap();
        unsafe {
            std::env::set_var("FKS_CMC_API_KEY", "test-key");
        }
        let adapter = CmcAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec
            .headers
            .contains(&("X-CMC_PRO_API_KEY".to_string(), "test-key".to_string())));
        unsafe {
            std::env::remove_var("FKS_CMC_API_KEY");
        }
    }

    #[test]
    fn normalizes_quotes_latest_shape() {
        let adapter = CmcAdapter;
        let raw = serde_json::json!({
            "data": {
                "BTC": {
                    "quote": {
                        "USD": {
                            "price": 50000.0,
                            "volume_24h": 1.0e9,
                            "market_cap": 1.0e12,
                            "percent_change_24h": 2.5,
                        }
                    },
                    "last_updated": "2024-11-26T16:00:00Z",
                }
            }
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Quote(q) => {
                assert_eq!(q.symbol, "BTC");
                assert_eq!(q.price, 50000.0);
                assert_eq!(q.ts, 1_732_636_800);
            }
            other => panic!("expected Quote, got {other:?}"),
        }
    }
}
