//! Shared application state threaded through every REST/webhook handler via
//! axum's `State` extractor. Handlers are independent and stateless beyond
//! the shared caches and the failover managers' own health state.

use std::collections::HashMap;
use std::sync::Arc;

use fks_backfill::BackfillStore;
use fks_cache::ResponseCache;
use fks_manager::{Fetcher, MultiProviderManager};
use fks_quality::QualityCollector;
use fks_store::OhlcvStore;
use fks_types::config::CacheTtlConfig;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError};
use fks_ws::FanoutController;

/// Everything a REST or webhook handler needs. Cheap to clone: every field
/// is an `Arc` or a handle already internally `Arc`-backed (`OhlcvStore`,
/// `ResponseCache`).
#[derive(Clone)]
pub struct AppState {
    /// Shared result cache fronting every provider family.
    pub cache: ResponseCache,
    /// Failover group for bar/kline data (`binance`, `coingecko`).
    pub bar_manager: Arc<MultiProviderManager>,
    /// Failover group for quote/ticker data (`cmc`).
    pub quote_manager: Arc<MultiProviderManager>,
    /// Failover group for fundamentals/time-series data (`eodhd`).
    pub series_manager: Arc<MultiProviderManager>,
    /// Failover group for futures microstructure data (`massive_futures`).
    pub futures_manager: Arc<MultiProviderManager>,
    /// Every adapter keyed by its stable name, for the `provider` query
    /// parameter that pins a single provider and bypasses failover.
    pub fetchers_by_name: Arc<HashMap<&'static str, Arc<dyn Fetcher>>>,
    /// Canonical OHLCV persistence.
    pub store: OhlcvStore,
    /// Active-asset/backfill-progress store (internally serializes writes
    /// behind its own connection mutex).
    pub backfill_store: Arc<BackfillStore>,
    /// Data-quality validators and composite scorer.
    pub quality: Arc<QualityCollector>,
    /// Real-time WebSocket fan-out controller.
    pub fanout: Arc<FanoutController>,
    /// Cache TTL policy, keyed by row family.
    pub cache_ttl: CacheTtlConfig,
    /// Binance webhook HMAC secret, if configured.
    pub binance_webhook_secret: Option<Arc<str>>,
    /// Polygon webhook HMAC secret, if configured.
    pub polygon_webhook_secret: Option<Arc<str>>,
}

impl AppState {
    /// Fetch `request` against `manager`, or — when `provider` names a
    /// specific adapter — against that adapter directly, bypassing the
    /// manager's failover and circuit breaker (an explicit pin is a request
    /// to talk to exactly that provider, not "try it first").
    ///
    /// # Errors
    /// Returns `FksError::NotFound` if `provider` names an adapter this
    /// process doesn't have registered; otherwise propagates whatever the
    /// manager or adapter returns.
    pub async fn fetch(
        &self,
        manager: &MultiProviderManager,
        provider: Option<&str>,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError> {
        match provider {
            Some(name) => {
                let fetcher = self
                    .fetchers_by_name
                    .get(name)
                    .ok_or_else(|| FksError::not_found(format!("provider {name}")))?;
                fetcher.fetch(request).await
            }
            None => manager.fetch(request).await,
        }
    }
}
