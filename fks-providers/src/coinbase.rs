//! Coinbase Exchange-shaped bar/kline adapter: public `/products/{id}/candles`
//! endpoint, no authentication required. Coinbase replies with a flat array
//! of `[time, low, high, open, close, volume]` tuples in no guaranteed order.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.exchange.coinbase.com/products";

/// Adapter for Coinbase Exchange's `/products/{product_id}/candles` endpoint.
pub struct CoinbaseAdapter;

#[async_trait]
impl ProviderAdapter for CoinbaseAdapter {
    fn name(&self) -> &'static str {
        "coinbase"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(3.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let mut query = vec![(
            "granularity".to_string(),
            granularity_for(&request.interval).to_string(),
        )];
        if let Some(start) = request.start {
            query.push(("start".to_string(), iso(start)));
        }
        if let Some(end) = request.end {
            query.push(("end".to_string(), iso(end)));
        }
        Ok(HttpRequestSpec {
            url: format!("{BASE_URL}/{}/candles", request.symbol.to_uppercase()),
            query,
            headers: vec![],
        })
    }

    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        let rows = raw.as_array().ok_or_else(|| FksError::Validation {
            provider: self.name().to_string(),
            message: "expected a top-level array of candle tuples".to_string(),
        })?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(bar) = parse_tuple(row) else { continue };
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

fn granularity_for(interval: &str) -> u32 {
    match interval {
        "1m" => 60,
        "5m" => 300,
        "15m" => 900,
        "1h" | "60m" => 3_600,
        "6h" => 21_600,
        _ => 86_400,
    }
}

fn iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn parse_tuple(row: &serde_json::Value) -> Option<MarketBar> {
    let item = row.as_array()?;
    Some(MarketBar {
        ts: item.first()?.as_i64()?,
        low: item.get(1)?.as_f64()?,
        high: item.get(2)?.as_f64()?,
        open: item.get(3)?.as_f64()?,
        close: item.get(4)?.as_f64()?,
        volume: item.get(5).and_then(serde_json::Value::as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "btc-usd".to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_uppercases_product_id() {
        let adapter = CoinbaseAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec.url.ends_with("/BTC-USD/candles"));
        assert!(spec.query.contains(&("granularity".to_string(), "3600".to_string())));
    }

    #[test]
    fn normalizes_and_sorts_low_high_open_close_tuples() {
        let adapter = CoinbaseAdapter;
        let raw = serde_json::json!([
            [1732582800_i64, 99.0, 101.0, 100.0, 100.8, 5.0],
            [1732579200_i64, 98.0, 100.0, 99.0, 99.5, 3.0],
        ]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 2);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => assert_eq!(bar.ts, 1_732_579_200),
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_array_payload() {
        let adapter = CoinbaseAdapter;
        let err = adapter.normalize(serde_json::json!({"message": "NotFound"}), &req()).unwrap_err();
        assert!(matches!(err, FksError::Validation { .. }));
    }
}
