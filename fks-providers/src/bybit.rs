//! Bybit-shaped bar/kline adapter: public `/v5/market/kline` endpoint, no
//! authentication required. Bybit replies with string-encoded fields and
//! newest-first ordering, both normalized away here.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::timestamp::normalize_epoch;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.bybit.com/v5/market/kline";

/// Adapter for Bybit's `/v5/market/kline` endpoint.
pub struct BybitAdapter;

#[async_trait]
impl ProviderAdapter for BybitAdapter {
    fn name(&self) -> &'static str {
        "bybit"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(5.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let mut query = vec![
            ("category".to_string(), "linear".to_string()),
            ("symbol".to_string(), request.symbol.to_uppercase()),
            ("interval".to_string(), interval_for(&request.interval).to_string()),
            (
                "limit".to_string(),
                request.limit.unwrap_or(200).min(1000).to_string(),
            ),
        ];
        if let Some(start) = request.start {
            query.push(("start".to_string(), (start * 1000).to_string()));
        }
        if let Some(end) = request.end {
            query.push(("end".to_string(), (end * 1000).to_string()));
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
        let obj = raw.as_object().ok_or_else(|| FksError::Validation {
            provider: self.name().to_string(),
            message: "expected a JSON object with retCode/result fields".to_string(),
        })?;

        let ret_code = obj.get("retCode").and_then(serde_json::Value::as_i64);
        if ret_code != Some(0) {
            return Err(FksError::Validation {
                provider: self.name().to_string(),
                message: format!(
                    "Bybit retCode {:?}: {}",
                    ret_code,
                    obj.get("retMsg").and_then(serde_json::Value::as_str).unwrap_or("")
                ),
            });
        }

        let list = obj
            .get("result")
            .and_then(|r| r.get("list"))
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| FksError::Validation {
                provider: self.name().to_string(),
                message: "missing result.list array".to_string(),
            })?;

        let mut data = Vec::with_capacity(list.len());
        for row in list {
            let Some(bar) = parse_row(row) else { continue };
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

fn interval_for(interval: &str) -> &'static str {
    match interval {
        "1m" => "1",
        "5m" => "5",
        "15m" => "15",
        "30m" => "30",
        "1h" | "60m" => "60",
        "4h" => "240",
        "1w" => "W",
        "1M" => "M",
        _ => "D",
    }
}

fn parse_row(row: &serde_json::Value) -> Option<MarketBar> {
    let item = row.as_array()?;
    let as_f64 = |v: &serde_json::Value| v.as_str()?.parse::<f64>().ok();
    Some(MarketBar {
        ts: normalize_epoch(item.first()?.as_str()?.parse::<i64>().ok()?),
        open: as_f64(item.get(1)?)?,
        high: as_f64(item.get(2)?)?,
        low: as_f64(item.get(3)?)?,
        close: as_f64(item.get(4)?)?,
        volume: item.get(5).and_then(as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "btcusdt".to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_caps_limit_at_1000() {
        let adapter = BybitAdapter;
        let req = FetchRequest { limit: Some(5000), ..req() };
        let spec = adapter.build_request(&req).unwrap();
        assert!(spec.query.contains(&("limit".to_string(), "1000".to_string())));
    }

    #[test]
    fn normalizes_newest_first_string_rows_into_sorted_bars() {
        let adapter = BybitAdapter;
        let raw = serde_json::json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "list": [
                    ["1732582800000", "100.8", "101.0", "100.5", "100.9", "5.0", "500.0"],
                    ["1732579200000", "99.5", "100.0", "99.0", "99.9", "3.0", "300.0"],
                ]
            }
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 2);
        assert!(result.is_monotonic());
        match &result.data[0] {
            NormalizedRow::Bar(bar) => assert_eq!(bar.ts, 1_732_579_200),
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn surfaces_non_zero_ret_code() {
        let adapter = BybitAdapter;
        let raw = serde_json::json!({"retCode": 10001, "retMsg": "param error", "result": {"list": []}});
        assert!(adapter.normalize(raw, &req()).is_err());
    }
}
