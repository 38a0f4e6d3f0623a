//! EODHD-shaped fundamentals/time-series adapter: earnings calendar rows
//! with a sidecar of provider-specific extra fields.

use std::collections::HashMap;

use async_trait::async_trait;
use fks_core::adapter::{HttpRequestSpec, ProviderAdapter};
use fks_core::{parse_iso_or_date, resolve_key};
use fks_types::{CanonicalFetchResult, FetchRequest, FksError, NormalizedRow, SeriesRow};

const BASE_URL: &str = "https://eodhistoricaldata.com/api/calendar/earnings";

/// Adapter for EODHD's `/calendar/earnings` endpoint.
pub struct EodhdAdapter;

#[async_trait]
impl ProviderAdapter for EodhdAdapter {
    fn name(&self) -> &'static str {
        "eodhd"
    }

    fn rate_limit_per_sec(&self) -> Option<f64> {
        Some(1.0)
    }

    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
        let api_key = resolve_key(&["EODHD_API_KEY", "FKS_EODHD_API_KEY"], None, "eodhd")
            .ok_or_else(|| FksError::Config("EODHD_API_KEY not found in environment".to_string()))?;
        let mut query = vec![
            ("api_token".to_string(), api_key),
            ("fmt".to_string(), "json".to_string()),
            ("symbols".to_string(), request.symbol.clone()),
        ];
        if let Some(start) = request.start {
            query.push(("from".to_string(), start.to_string()));
        }
        if let Some(end) = request.end {
            query.push(("to".to_string(), end.to_string()));
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
            message: "expected a top-level array of earnings rows".to_string(),
        })?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(report_date) = row.get("report_date").and_then(serde_json::Value::as_str) else {
                continue;
            };
            let Some(ts) = parse_iso_or_date(report_date) else { continue };
            let actual = row.get("actual").and_then(serde_json::Value::as_f64);
            let value = actual.unwrap_or(0.0);

            let mut extra = HashMap::new();
            if let Some(estimate) = row.get("estimate") {
                extra.insert("estimate".to_string(), estimate.clone());
            }
            if let Some(name) = row.get("name") {
                extra.insert("company_name".to_string(), name.clone());
            }
            if let Some(surprise) = row.get("surprise_percent") {
                extra.insert("surprise_percent".to_string(), surprise.clone());
            }

            data.push(NormalizedRow::Series(SeriesRow {
                ts,
                value,
                ohlcv: None,
                extra,
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

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "AAPL.US".to_string(),
            interval: "earnings".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[test]
    fn build_request_fails_without_api_key() {
        unsafe {
            std::env::remove_var("EODHD_API_KEY");
            std::env::remove_var("FKS_EODHD_API_KEY");
        }
        let adapter = EodhdAdapter;
        let err = adapter.build_request(&req()).unwrap_err();
        assert!(matches!(err, FksError::Config(_)));
    }

    #[test]
    fn normalizes_earnings_calendar_rows_with_sidecar_fields() {
        let adapter = EodhdAdapter;
        let raw = serde_json::json!([
            {
                "code": "AAPL.US",
                "name": "Apple Inc",
                "report_date": "2024-11-26",
                "estimate": 1.5,
                "actual": 1.64,
                "surprise_percent": 9.3,
            }
        ]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert_eq!(result.data.len(), 1);
        match &result.data[0] {
            NormalizedRow::Series(series) => {
                assert_eq!(series.ts, 1_732_579_200);
                assert_eq!(series.value, 1.64);
                assert!(series.extra.contains_key("estimate"));
            }
            other => panic!("expected Series, got {other:?}"),
        }
    }

    #[test]
    fn skips_rows_with_unparseable_dates() {
        let adapter = EodhdAdapter;
        let raw = serde_json::json!([{"report_date": "not-a-date"}]);
        let result = adapter.normalize(raw, &req()).unwrap();
        assert!(result.data.is_empty());
    }
}
