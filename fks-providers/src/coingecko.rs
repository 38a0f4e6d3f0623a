//! CoinGecko-shaped bar/kline adapter: free-tier market chart endpoint, no
//! authentication required. CoinGecko reports price-only points, so bars are
//! degenerate (`open=high=low=close`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::timestamp::normalize_epoch;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, MarketBar, NormalizedRow};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";

fn symbol_to_coin_id(symbol: &str) -> &str {
    match symbol.to_uppercase().as_str() {
        "BTC" => "bitcoin",
        "ETH" => "ethereum",
        "BNB" => "binancecoin",
        "SOL" => "solana",
        "ADA" => "cardano",
        "XRP" => "ripple",
        "DOT" => "polkadot",
        "DOGE" => "dogecoin",
        other => other,
    }
}

/// Adapter for CoinGecko's `/coins/{id}/market_chart` endpoint.
pub struct CoinGeckoAdapter;

#[async_trait]
impl ProviderAdapter for CoinGeckoAdapter {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(8.33)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let coin_id = symbol_to_coin_id(&request.symbol);
        let days = match (request.start, request.end) {
            (Some(start), Some(end)) => ((end - start) / 86_400).max(1).to_string(),
            _ => "1".to_string(),
        };
        Ok(HttpRequestSpec {
            url: format!("{BASE_URL}/coins/{coin_id}/market_chart"),
            query: vec![
                ("vs_currency".to_string(), "usd".to_string()),
                ("days".to_string(), days),
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
            message: "expected a JSON object with a prices array".to_string(),
        })?;

        let mut prices: BTreeMap<i64, f64> = BTreeMap::new();
        let mut volumes: BTreeMap<i64, f64> = BTreeMap::new();
        extract_series(obj.get("prices"), &mut prices);
        extract_series(obj.get("total_volumes"), &mut volumes);

        let data = prices
            .into_iter()
            .map(|(ts, price)| {
                NormalizedRow::Bar(MarketBar {
                    ts,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: volumes.get(&ts).copied().unwrap_or(0.0),
                })
            })
            .collect();

        Ok(CanonicalFetchResult {
            provider: self.name().to_string(),
            data,
            request: request.clone(),
        })
    }
}

fn extract_series(points: Option<&serde_json::Value>, into: &mut BTreeMap<i64, f64>) {
    let Some(points) = points.and_then(serde_json::Value::as_array) else {
        return;
    };
    for point in points {
        let Some(pair) = point.as_array() else { continue };
        let (Some(ts_ms), Some(value)) = (
            pair.first().and_then(serde_json::Value::as_i64),
            pair.get(1).and_then(serde_json::Value::as_f64),
        ) else {
            continue;
        };
        into.insert(normalize_epoch(ts_ms), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "BTC".to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_maps_symbol_to_coin_id() {
        let adapter = CoinGeckoAdapter;
        let spec = adapter.build_request(&req()).unwrap();
        assert!(spec.url.contains("/coins/bitcoin/market_chart"));
    }

    #[test]
    fn normalizes_price_and_volume_series_into_degenerate_bars() {
        let adapter = CoinGeckoAdapter;
        let raw = serde_json::json!({
            "prices": [[1732636800000_i64, 100.0], [1732640400000_i64, 101.0]],
            "total_volumes": [[1732636800000_i64, 12.0]],
        });
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 2);
        match &result.data[0] {
            NormalizedRow::Bar(bar) => {
                assert_eq!(bar.close, 100.0);
                assert_eq!(bar.volume, 12.0);
            }
            other => panic!("expected Bar, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_object_payload() {
        let adapter = CoinGeckoAdapter;
        let err = adapter.normalize(serde_json::json!([1, 2, 3]), &req()).unwrap_err();
        assert!(matches!(err, FksError::Validation { .. }));
    }
}
