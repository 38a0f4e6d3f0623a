//! The REST surface: price/OHLCV/futures endpoints with a
//! cache-then-fetch shape, static provider metadata, and a liveness +
//! per-provider health probe.
//!
//! Every data endpoint checks the shared response cache before consulting
//! the relevant failover manager, and populates it with the family's
//! configured TTL. Administrative/error bodies use the `{ok, data?,
//! error?, code?}` envelope; data bodies return typed JSON directly.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fks_cache::derive_key;
use fks_manager::latest_close;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Build the router for every REST endpoint in this module, bound to
/// `state`.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/price", get(get_price))
        .route("/ohlcv", get(get_ohlcv))
        .route("/providers", get(get_providers))
        .route("/health", get(get_health))
        .route("/futures/aggs", get(get_futures_aggs))
        .with_state(state)
}

/// Administrative envelope for endpoints that don't return a typed payload
/// directly: `{ok, data?, error?, code?}`.
#[derive(Debug, Serialize)]
struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

fn error_code(err: &FksError) -> (StatusCode, &'static str) {
    match err {
        FksError::Config(_) | FksError::InvalidArg(_) => (StatusCode::BAD_REQUEST, "config_error"),
        FksError::NotFound { .. } | FksError::Unsupported { .. } => (StatusCode::NOT_FOUND, "not_found"),
        FksError::SignatureInvalid => (StatusCode::UNAUTHORIZED, "signature_invalid"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

/// Local wrapper so this crate can implement `IntoResponse` for
/// `fks_types::FksError` without violating the orphan rule.
pub struct ApiError(pub FksError);

impl From<FksError> for ApiError {
    fn from(err: FksError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = error_code(&self.0);
        let body: Envelope<()> = Envelope {
            ok: false,
            data: None,
            error: Some(self.0.to_string()),
            code: Some(code),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PriceQuery {
    symbol: String,
    provider: Option<String>,
    #[serde(default = "default_true")]
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct OhlcvQuery {
    symbol: String,
    interval: String,
    start: Option<i64>,
    end: Option<i64>,
    limit: Option<u32>,
    provider: Option<String>,
    #[serde(default = "default_true")]
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct FuturesAggsQuery {
    symbol: String,
    interval: String,
    start: Option<i64>,
    end: Option<i64>,
    limit: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct PriceResponse {
    symbol: String,
    price: f64,
    provider: String,
    ts: i64,
}

/// `GET /price?symbol&provider?&use_cache?` — latest price via the bar
/// failover manager (or a pinned provider), 60s result cache.
async fn get_price(
    State(state): State<AppState>,
    Query(q): Query<PriceQuery>,
) -> Result<Json<PriceResponse>, ApiError> {
    let cache_key = derive_key("price", &[&q.symbol, q.provider.as_deref().unwrap_or("-")]);
    if q.use_cache
        && let Some(cached) = state.cache.get::<PriceResponse>(&cache_key, state.cache_ttl.rest_price).await
    {
        return Ok(Json(cached));
    }

    let request = FetchRequest {
        symbol: q.symbol.clone(),
        interval: "1m".to_string(),
        start: None,
        end: None,
        limit: Some(1),
    };
    let result = state.fetch(&state.bar_manager, q.provider.as_deref(), &request).await?;
    let price = latest_close(&result).ok_or_else(|| FksError::not_found(format!("price for {}", q.symbol)))?;
    let ts = result.data.last().map(fks_types::NormalizedRow::ts).unwrap_or_default();
    let response = PriceResponse {
        symbol: q.symbol,
        price,
        provider: result.provider,
        ts,
    };
    state.cache.set(&cache_key, &response).await;
    Ok(Json(response))
}

/// `GET /ohlcv?symbol&interval&start?&end?&limit?&provider?&use_cache?` —
/// canonical bar rows, 300s result cache.
async fn get_ohlcv(
    State(state): State<AppState>,
    Query(q): Query<OhlcvQuery>,
) -> Result<Json<CanonicalFetchResult>, ApiError> {
    let cache_key = derive_key(
        "ohlcv",
        &[
            &q.symbol,
            &q.interval,
            &q.start.map_or_else(String::new, |v| v.to_string()),
            &q.end.map_or_else(String::new, |v| v.to_string()),
            q.provider.as_deref().unwrap_or("-"),
        ],
    );
    if q.use_cache
        && let Some(cached) = state
            .cache
            .get::<CanonicalFetchResult>(&cache_key, state.cache_ttl.rest_ohlcv)
            .await
    {
        return Ok(Json(cached));
    }

    let request = FetchRequest {
        symbol: q.symbol,
        interval: q.interval,
        start: q.start,
        end: q.end,
        limit: q.limit,
    };
    let result = state.fetch(&state.bar_manager, q.provider.as_deref(), &request).await?;
    state.cache.set(&cache_key, &result).await;
    Ok(Json(result))
}

/// `GET /futures/aggs?symbol&interval&start?&end?&limit?` — thin
/// pass-through to the futures microstructure adapter, the only futures
/// endpoint family this adapter's aggregate-bar shape covers.
async fn get_futures_aggs(
    State(state): State<AppState>,
    Query(q): Query<FuturesAggsQuery>,
) -> Result<Json<CanonicalFetchResult>, ApiError> {
    let request = FetchRequest {
        symbol: q.symbol,
        interval: q.interval,
        start: q.start,
        end: q.end,
        limit: q.limit,
    };
    let result = state.futures_manager.fetch(&request).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct ProviderMeta {
    name: &'static str,
    family: &'static str,
}

/// `GET /providers` — static metadata list.
async fn get_providers() -> Json<Vec<ProviderMeta>> {
    Json(vec![
        ProviderMeta { name: "binance", family: "bar" },
        ProviderMeta { name: "coingecko", family: "bar" },
        ProviderMeta { name: "kraken", family: "bar" },
        ProviderMeta { name: "coinbase", family: "bar" },
        ProviderMeta { name: "bybit", family: "bar" },
        ProviderMeta { name: "polygon", family: "bar" },
        ProviderMeta { name: "alpha_vantage", family: "bar" },
        ProviderMeta { name: "finnhub", family: "bar" },
        ProviderMeta { name: "tiingo", family: "bar" },
        ProviderMeta { name: "cmc", family: "quote" },
        ProviderMeta { name: "eodhd", family: "series" },
        ProviderMeta { name: "massive_futures", family: "futures" },
    ])
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
    bar: Vec<fks_types::ProviderHealth>,
    quote: Vec<fks_types::ProviderHealth>,
    series: Vec<fks_types::ProviderHealth>,
    futures: Vec<fks_types::ProviderHealth>,
}

/// `GET /health` — liveness plus a per-provider availability probe drawn
/// from every failover group's health snapshot.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        bar: state.bar_manager.health_snapshot().await,
        quote: state.quote_manager.health_snapshot().await,
        series: state.series_manager.health_snapshot().await,
        futures: state.futures_manager.health_snapshot().await,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_query_defaults_use_cache_to_true() {
        let q: PriceQuery = serde_json::from_str(r#"{"symbol":"BTCUSDT"}"#).unwrap();
        assert!(q.use_cache);
        assert_eq!(q.provider, None);
    }

    #[test]
    fn ohlcv_query_parses_optional_range() {
        let q: OhlcvQuery =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","interval":"1h","start":1,"end":2}"#).unwrap();
        assert_eq!(q.start, Some(1));
        assert_eq!(q.end, Some(2));
        assert!(q.use_cache);
    }

    #[test]
    fn error_envelope_maps_not_found_to_404() {
        let err = FksError::not_found("quote for AAPL");
        let (status, code) = error_code(&err);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not_found");
    }

    #[test]
    fn error_envelope_maps_config_to_400() {
        let err = FksError::Config("missing key".to_string());
        let (status, code) = error_code(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "config_error");
    }
}
