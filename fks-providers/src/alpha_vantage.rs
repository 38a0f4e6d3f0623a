//! Alpha Vantage-shaped bar/kline adapter: authenticated `TIME_SERIES_DAILY`
//! endpoint. Intraday/crypto function variants exist upstream but are out of
//! scope here; daily bars are the shape this system's store needs.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::{parse_iso_or_date, resolve_key};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Adapter for Alpha Vantage's `TIME_SERIES_DAILY` function.
pub struct AlphaVantageAdapter;

#[async_trait]
impl ProviderAdapter for AlphaVantageAdapter {
    fn name(&self) -> &'static str {
        "alpha_vantage"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(0.083)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(
            &["ALPHA_VANTAGE_API_KEY", "FKS_ALPHA_VANTAGE_API_KEY"],
            None,
            "alpha_vantage",
        )
        .ok_or_else(|| {
            FksError::Config("ALPHA_VANTAGE_API_KEY not found in environment".to_string())
        })?;
        Ok(HttpRequestSpec {
            url: BASE_URL.to_string(),
            query: vec![
                ("function".to_string(), "TIME_SERIES_DAILY".to_string()),
                ("symbol".to_string(), request.symbol.to_uppercase()),
                ("outputsize".to_string(), "full".to_string()),
                ("apikey".to_string(), api_key),
            ],
            headers: vec![],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        if let Some(msg) = raw.get("Error Message").and_then(serde_json::Value::as_str) {
            return Err(FksError::Validation {
                provider: self.name().to_string(),
                message: format!("API error: {msg}"),
            });
        }
        let series = raw
            .get("Time Series (Daily)")
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| FksError::Validation {
                provider: self.name().to_string(),
                message: "expected a \"Time Series (Daily)\" object".to_string(),
            })?;

        let mut data = Vec::with_capacity(series.len());
        for (date, values) in series {
            let Some(ts) = parse_iso_or_date(date) else { continue };
            let Some(bar) = parse_bar(ts, values) else { continue };
            if bar.is_valid() {
                data.push(NormalizedRow::Bar(bar));
            }
        }
        data.sort_by_key(NormalizedRow::ts);

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
}

fn parse_bar(ts: i64, values: &serde_json::Value) -> Option<MarketBar> {
    let field = |key: &str| values.get(key)?.as_str()?.parse::<f64>().ok();
    Some(MarketBar {
        ts,
        open: field("1. open")?,
        high: field("2. high")?,
        low: field("3. low")?,
        close: field("4. close")?,
        volume: field("5. volume").unwrap_or(0.0),
    })
}
