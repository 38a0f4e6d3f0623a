//! Binance-shaped bar/kline adapter: public futures klines endpoint, no
//! authentication required.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::timestamp::normalize_epoch;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://fapi.binance.com/fapi/v1/klines";

/// Adapter for Binance Futures klines: `GET /fapi/v1/klines`.
pub struct BinanceAdapter;

#[async_trait]
impl ProviderAdapter for BinanceAdapter {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(10.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let mut query = vec![
            ("symbol".to_string(), request.symbol.clone()),
            ("interval".to_string(), request.interval.clone()),
            (
                "limit".to_string(),
                request.limit.unwrap_or(500).to_string(),
            ),
        ];
        if let Some(start) = request.start {
            query.push(("startTime".to_string(), (start * 1000).to_string()));
        }
        if let Some(end) = request.end {
            query.push(("endTime".to_string(), (end * 1000).to_string()));
        }
        Ok(HttpRequestSpec {
            url: BASE_URL.to_string(),
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
            message: "expected a top-level array of klines".to_string(),
        })?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(item) = row.as_array() else { continue };
            let Some(bar) = parse_kline(item) else { continue };
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

fn parse_kline(item: &[serde_json::Value]) -> Option<MarketBar> {
    let ts_ms = item.first()?.as_i64()?;
    let open = item.get(1)?.as_str()?.parse::<f64>().ok()?;
    let high = item.get(2)?.as_str()?.parse::<f64>().ok()?;
    let low = item.get(3)?.as_str()?.parse::<f64>().ok()?;
    let close = item.get(4)?.as_str()?.parse::<f64>().ok()?;
    let volume = item.get(5)?.as_str()?.parse::<f64>().ok()?;
    Some(MarketBar {
        ts: normalize_epoch(ts_ms),
        open,
        high,
        low,
        close,
        volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            start: Some(1_732_636_800),
            end: None,
            limit: Some(2),
        }
    }

    #[test]
    fn build_request_converts_seconds_to_millis() {
        let adapter = BinanceAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec
            .query
            .contains(&("startTime".to_string(), "1732636800000".to_string())));
        assert!(spec.query.contains(&("symbol".to_string(), "BTCUSDT".to_string())));
    }

    #[test]
    fn normalizes_official_kline_array_shape() {
        let adapter = BinanceAdapter;
        let raw = serde_json::json!([
            [1732636800000_i64, "100.0", "101.0", "99.0", "100.5", "12.3", 1732640399999_i64, "0", 10, "0", "0", "0"]
        ]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => {
                assert_eq!(bar.ts, 1_732_636_800);
                assert_eq!(bar.close, 100.5);
            }
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_array_payload() {
        let adapter = BinanceAdapter;
        let err = adapter.normalize(serde_json::json!({"code": -1}), &req()).unwrap_err();
        assert!(matches!(err, FksError::Validation { .. }));
    }

    #[test]
    fn skips_malformed_rows_without_failing() {
        let adapter = BinanceAdapter;
        let raw = serde_json::json!([
            ["not", "a", "valid", "kline"],
            [1732636800000_i64, "100.0", "101.0", "99.0", "100.5", "12.3"],
        ]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
    }
}
