//! Kraken-shaped bar/kline adapter: public `/0/public/OHLC` endpoint, no
//! authentication required. Kraken nests the OHLC array under a
//! provider-assigned pair key inside `result` rather than a fixed field name.

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.kraken.com/0/public/OHLC";

/// Adapter for Kraken's `/0/public/OHLC` endpoint.
pub struct KrakenAdapter;

#[async_trait]
impl ProviderAdapter for KrakenAdapter {
    fn name(&self) -> &'static str {
        "kraken"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(1.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let mut query = vec![
            ("pair".to_string(), request.symbol.to_uppercase()),
            ("interval".to_string(), minutes_for(&request.interval).to_string()),
        ];
        if let Some(start) = request.start {
            query.push(("since".to_string(), start.to_string()));
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
            message: "expected a JSON object with error/result fields".to_string(),
        })?;

        if let Some(errors) = obj.get("error").and_then(serde_json::Value::as_array)
            && !errors.is_empty()
        {
            return Err(FksError::Validation {
                provider: self.name().to_string(),
                message: format!("Kraken error envelope: {errors:?}"),
            });
        }

        let result = obj.get("result").and_then(serde_json::Value::as_object).ok_or_else(|| {
            FksError::Validation {
                provider: self.name().to_string(),
                message: "missing result object".to_string(),
            }
        })?;

        let mut data = Vec::new();
        for (key, value) in result {
            if key == "last" {
                continue;
            }
            let Some(rows) = value.as_array() else { continue };
            for row in rows {
                let Some(bar) = parse_row(row) else { continue };
                if bar.is_valid() {
                    data.push(NormalizedRow::Bar(bar));
                }
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

fn minutes_for(interval: &str) -> u32 {
    match interval {
        "1m" => 1,
        "5m" => 5,
        "15m" => 15,
        "30m" => 30,
        "1h" | "60m" => 60,
        "4h" => 240,
        "1w" => 10_080,
        _ => 1_440,
    }
}

fn parse_row(row: &serde_json::Value) -> Option<MarketBar> {
    let item = row.as_array()?;
    let ts = item.first()?.as_i64()?;
    let as_f64 = |v: &serde_json::Value| v.as_str()?.parse::<f64>().ok();
    Some(MarketBar {
        ts,
        open: as_f64(item.get(1)?)?,
        high: as_f64(item.get(2)?)?,
        low: as_f64(item.get(3)?)?,
        close: as_f64(item.get(4)?)?,
        volume: item.get(6).and_then(as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "xbtusd".to_string(),
            interval: "1h".to_string(),
            start: Some(1_732_579_200),
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_uppercases_pair_and_maps_interval() {
        let adapter = KrakenAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec.query.contains(&("pair".to_string(), "XBTUSD".to_string())));
        assert!(spec.query.contains(&("interval".to_string(), "60".to_string())));
    }

    #[test]
    fn normalizes_pair_keyed_result_ignoring_last_cursor() {
        let adapter = KrakenAdapter;
        let raw = serde_json::json!({
            "error": [],
            "result": {
                "XXBTZUSD": [
                    [1732579200_i64, "100.0", "101.0", "99.0", "100.5", "100.2", "12.3", 10]
                ],
                "last": 1732579200
            }
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => {
                assert_eq!(bar.ts, 1_732_579_200);
                assert_eq!(bar.close, 100.5);
            }
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn surfaces_error_envelope() {
        let adapter = KrakenAdapter;
        let raw = serde_json::json!({"error": ["EQuery:Unknown asset pair"], "result": {}});
        assert!(adapter.normalize(raw, &req()).is_err());
    }
}
