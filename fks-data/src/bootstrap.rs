//! Assembles every provider, store, and background task into one
//! `AppState` for `main.rs` to serve alongside the HTTP listener.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fks_backfill::BackfillStore;
use fks_cache::ResponseCache;
use fks_core::adapter::{Adapter, ProviderAdapter};
use fks_core::auth::resolve_key;
use fks_manager::{Fetcher, MultiProviderManager};
use fks_providers::{
    AlphaVantageAdapter, BinanceAdapter, BybitAdapter, CmcAdapter, CoinGeckoAdapter, CoinbaseAdapter,
    EodhdAdapter, FinnhubAdapter, KrakenAdapter, MassiveFuturesAdapter, PolygonAdapter, TiingoAdapter,
};
use fks_quality::QualityCollector;
use fks_store::{run_migrations, spawn_writer, OhlcvStore};
use fks_types::config::resolve_timeout;
use fks_ws::{FanoutController, PollingConnector};
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::state::AppState;

/// `AppState` plus the long-running background tasks spawned alongside it.
pub struct Bootstrapped {
    /// State shared by every REST/webhook handler.
    pub state: AppState,
    /// Background task persisting composite quality scores.
    pub quality_writer: JoinHandle<()>,
    /// Background task driving the WebSocket fan-out reconciliation loop.
    pub fanout_task: JoinHandle<()>,
}

/// Build every component named in `config`: connect to Postgres and run
/// migrations, construct the five provider adapters wrapped with the shared
/// lifecycle, assemble per-asset-class failover managers, open the backfill
/// store, wire the quality collector to its async persistence sink, and
/// start the WebSocket fan-out controller.
///
/// # Errors
/// Returns an error if the database cannot be reached, migrations fail, or
/// the backfill store cannot be opened.
pub async fn build(config: &AppConfig) -> anyhow::Result<Bootstrapped> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    run_migrations(&pool, &config.migrations_dir)
        .await
        .context("running schema migrations")?;

    let cache = ResponseCache::new(10_000);

    let timeout_for = |provider_upper: &str| resolve_timeout(provider_upper, config.fks.provider_timeout);

    let binance = Arc::new(Adapter::new(BinanceAdapter, timeout_for("BINANCE"), config.fks.backoff));
    let coingecko = Arc::new(Adapter::new(CoinGeckoAdapter, timeout_for("COINGECKO"), config.fks.backoff));
    let kraken = Arc::new(Adapter::new(KrakenAdapter, timeout_for("KRAKEN"), config.fks.backoff));
    let coinbase = Arc::new(Adapter::new(CoinbaseAdapter, timeout_for("COINBASE"), config.fks.backoff));
    let bybit = Arc::new(Adapter::new(BybitAdapter, timeout_for("BYBIT"), config.fks.backoff));
    let polygon = Arc::new(Adapter::new(PolygonAdapter, timeout_for("POLYGON"), config.fks.backoff));
    let alpha_vantage = Arc::new(Adapter::new(
        AlphaVantageAdapter,
        timeout_for("ALPHA_VANTAGE"),
        config.fks.backoff,
    ));
    let finnhub = Arc::new(Adapter::new(FinnhubAdapter, timeout_for("FINNHUB"), config.fks.backoff));
    let tiingo = Arc::new(Adapter::new(TiingoAdapter, timeout_for("TIINGO"), config.fks.backoff));
    let cmc = Arc::new(Adapter::new(CmcAdapter, timeout_for("CMC"), config.fks.backoff));
    let eodhd = Arc::new(Adapter::new(EodhdAdapter, timeout_for("EODHD"), config.fks.backoff));
    let massive_futures = Arc::new(Adapter::new(
        MassiveFuturesAdapter,
        timeout_for("MASSIVE_FUTURES"),
        config.fks.backoff,
    ));

    let mut fetchers_by_name: HashMap<&'static str, Arc<dyn Fetcher>> = HashMap::new();
    fetchers_by_name.insert(BinanceAdapter.name(), binance.clone());
    fetchers_by_name.insert(CoinGeckoAdapter.name(), coingecko.clone());
    fetchers_by_name.insert(KrakenAdapter.name(), kraken.clone());
    fetchers_by_name.insert(CoinbaseAdapter.name(), coinbase.clone());
    fetchers_by_name.insert(BybitAdapter.name(), bybit.clone());
    fetchers_by_name.insert(PolygonAdapter.name(), polygon.clone());
    fetchers_by_name.insert(AlphaVantageAdapter.name(), alpha_vantage.clone());
    fetchers_by_name.insert(FinnhubAdapter.name(), finnhub.clone());
    fetchers_by_name.insert(TiingoAdapter.name(), tiingo.clone());
    fetchers_by_name.insert(CmcAdapter.name(), cmc.clone());
    fetchers_by_name.insert(EodhdAdapter.name(), eodhd.clone());
    fetchers_by_name.insert(MassiveFuturesAdapter.name(), massive_futures.clone());

    // Crypto bar family tries the futures-grade Binance feed first, falling
    // back across public exchange endpoints before the slower, paid stock
    // data sources that also expose a bar shape.
    let bar_manager = Arc::new(MultiProviderManager::new(
        vec![
            binance.clone(),
            coingecko.clone(),
            kraken.clone(),
            coinbase.clone(),
            bybit.clone(),
            polygon.clone(),
            alpha_vantage.clone(),
            finnhub.clone(),
            tiingo.clone(),
        ],
        config.fks.circuit_breaker,
        config.fks.verification,
    ));
    let quote_manager = Arc::new(MultiProviderManager::new(
        vec![cmc.clone()],
        config.fks.circuit_breaker,
        config.fks.verification,
    ));
    let series_manager = Arc::new(MultiProviderManager::new(
        vec![eodhd.clone()],
        config.fks.circuit_breaker,
        config.fks.verification,
    ));
    let futures_manager = Arc::new(MultiProviderManager::new(
        vec![massive_futures.clone()],
        config.fks.circuit_breaker,
        config.fks.verification,
    ));

    let store = OhlcvStore::new(pool.clone());

    let backfill_store = Arc::new(
        BackfillStore::open(&config.backfill_db_path).context("opening backfill store")?,
    );

    let (quality_sink, quality_writer) = spawn_writer(pool.clone());
    let quality = Arc::new(QualityCollector::new().with_sink(Box::new(quality_sink)));

    let registry = fks_ws::SubscriptionRegistry::new();
    let connector = Arc::new(PollingConnector::new(bar_manager.clone(), Duration::from_secs(5)));
    let fanout = Arc::new(FanoutController::new(registry, connector, 1024));
    let fanout_task = tokio::spawn(fanout.clone().run());

    let binance_webhook_secret = config
        .binance_webhook_secret
        .clone()
        .or_else(|| resolve_key(&["FKS_BINANCE_WEBHOOK_SECRET"], None, "binance-webhook"))
        .map(Arc::from);
    let polygon_webhook_secret = config
        .polygon_webhook_secret
        .clone()
        .or_else(|| resolve_key(&["FKS_POLYGON_WEBHOOK_SECRET"], None, "polygon-webhook"))
        .map(Arc::from);

    let state = AppState {
        cache,
        bar_manager,
        quote_manager,
        series_manager,
        futures_manager,
        fetchers_by_name: Arc::new(fetchers_by_name),
        store,
        backfill_store,
        quality,
        fanout,
        cache_ttl: config.fks.cache_ttl,
        binance_webhook_secret,
        polygon_webhook_secret,
    };

    Ok(Bootstrapped {
        state,
        quality_writer,
        fanout_task,
    })
}
