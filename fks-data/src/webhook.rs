//! Webhook receivers: verify an HMAC-SHA256 signature against the
//! configured per-provider secret with constant-time comparison, then
//! normalize `kline` events whose `is_closed` flag is set and populate the
//! response cache so a subsequent `/ohlcv` read sees the pushed bar without
//! waiting on the next poll.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use fks_cache::derive_key;
use fks_core::timestamp::normalize_epoch;
use fks_types::MarketBar;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::rest::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Build the router for both webhook receivers, bound to `state`.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhooks/binance", post(binance_webhook))
        .route("/webhooks/polygon", post(polygon_webhook))
        .with_state(state)
}

/// Verify `body` against `signature_hex` using `secret`, constant-time.
///
/// The decoded signature and the computed MAC are compared with `subtle`'s
/// slice `ct_eq`, never a manual length-then-content comparison.
fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();
    let Ok(provided) = hex_decode(signature_hex) else {
        return false;
    };
    expected.as_slice().ct_eq(provided.as_slice()).into()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn verified_body(secret: Option<&str>, headers: &HeaderMap, body: &[u8], header_name: &str) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        return Err(fks_types::FksError::Config(format!("{header_name} secret not configured")).into());
    };
    let signature = headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .ok_or(fks_types::FksError::SignatureInvalid)?;
    if !verify_signature(secret, body, signature) {
        return Err(fks_types::FksError::SignatureInvalid.into());
    }
    Ok(())
}

/// Binance's kline-closed webhook shape: `{"e":"kline","k":{"t":...,
/// "o":"...","h":"...","l":"...","c":"...","v":"...","x":bool,"s":"..."}}`.
fn parse_binance_kline(payload: &serde_json::Value) -> Option<(String, MarketBar)> {
    if payload.get("e")?.as_str()? != "kline" {
        return None;
    }
    let k = payload.get("k")?;
    if !k.get("x")?.as_bool()? {
        return None; // only closed candles are normalized
    }
    let symbol = k.get("s")?.as_str()?.to_string();
    let bar = MarketBar {
        ts: normalize_epoch(k.get("t")?.as_i64()?),
        open: k.get("o")?.as_str()?.parse().ok()?,
        high: k.get("h")?.as_str()?.parse().ok()?,
        low: k.get("l")?.as_str()?.parse().ok()?,
        close: k.get("c")?.as_str()?.parse().ok()?,
        volume: k.get("v")?.as_str()?.parse().ok()?,
    };
    if !bar.is_valid() {
        return None;
    }
    Some((symbol, bar))
}

/// `POST /webhooks/binance` — verify the signature, and on a closed kline
/// event, normalize and cache the bar under the `1m` key the REST layer
/// reads.
async fn binance_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, ApiError> {
    verified_body(state.binance_webhook_secret.as_deref(), &headers, &body, "x-binance-signature")?;

    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return Ok(StatusCode::OK); // malformed body: accepted, not normalized
    };
    if let Some((symbol, bar)) = parse_binance_kline(&payload) {
        let key = derive_key("price", &[&symbol, "-"]);
        state
            .cache
            .set(
                &key,
                &serde_json::json!({
                    "symbol": symbol,
                    "price": bar.close,
                    "provider": "binance",
                    "ts": bar.ts,
                }),
            )
            .await;
    }
    Ok(StatusCode::OK)
}

/// Polygon's aggregate-closed webhook shape, mirroring the futures
/// adapter's `aggs` row but pushed rather than polled.
fn parse_polygon_agg(payload: &serde_json::Value) -> Option<(String, MarketBar)> {
    if payload.get("ev")?.as_str()? != "AM" && payload.get("ev")?.as_str()? != "A" {
        return None;
    }
    let symbol = payload.get("sym")?.as_str()?.to_string();
    let bar = MarketBar {
        ts: normalize_epoch(payload.get("s")?.as_i64()?),
        open: payload.get("o")?.as_f64()?,
        high: payload.get("h")?.as_f64()?,
        low: payload.get("l")?.as_f64()?,
        close: payload.get("c")?.as_f64()?,
        volume: payload.get("v").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
    };
    if !bar.is_valid() {
        return None;
    }
    Some((symbol, bar))
}

/// `POST /webhooks/polygon` — verify the signature, and on an aggregate
/// event, normalize and cache the bar.
async fn polygon_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<StatusCode, ApiError> {
    verified_body(state.polygon_webhook_secret.as_deref(), &headers, &body, "x-polygon-signature")?;

    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return Ok(StatusCode::OK);
    };
    if let Some((symbol, bar)) = parse_polygon_agg(&payload) {
        let key = derive_key("price", &[&symbol, "-"]);
        state
            .cache
            .set(
                &key,
                &serde_json::json!({
                    "symbol": symbol,
                    "price": bar.close,
                    "provider": "massive_futures",
                    "ts": bar.ts,
                }),
            )
            .await;
    }
    Ok(StatusCode::OK)
}
