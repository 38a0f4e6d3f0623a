//! Process entrypoint: load configuration, assemble every component via
//! `bootstrap::build`, spawn the long-running background loops, and serve
//! the merged HTTP/WebSocket router until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::Context;
use fks_data::{bootstrap, config::AppConfig, rest, state::AppState, webhook};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();
    let bootstrapped = bootstrap::build(&config).await.context("bootstrapping fks-data")?;
    let state = bootstrapped.state;

    spawn_backfill_loop(&config, &state);
    spawn_scheduler_loop(&config, &state);

    let app = axum::Router::new()
        .merge(rest::router(state.clone()))
        .merge(webhook::router(state.clone()))
        .route("/ws", axum::routing::get(fks_ws::ws_handler).with_state(state.fanout.clone()))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "fks-data listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    bootstrapped.fanout_task.abort();
    bootstrapped.quality_writer.abort();
    Ok(())
}

/// Drive the historical backfill walk against tracked assets forever, in
/// the background. Errors mid-walk are logged by the walk loop itself and
/// never stop the server.
fn spawn_backfill_loop(config: &AppConfig, state: &AppState) {
    let backfill_store = state.backfill_store.clone();
    let manager = state.bar_manager.clone();
    let store = state.store.clone();
    let csv_base_dir = config.csv_base_dir.clone();
    let cfg = config.fks.backfill;
    tokio::spawn(async move {
        fks_backfill::run_forever(&backfill_store, &manager, &store, &csv_base_dir, &cfg).await;
    });
}

/// Drive the periodic collection plan against every enabled tracked asset
/// and interval, in the background.
fn spawn_scheduler_loop(config: &AppConfig, state: &AppState) {
    let scheduler = Arc::new(fks_scheduler::Scheduler::new(
        state.bar_manager.clone(),
        Arc::new(state.store.clone()),
        config.fks.backoff,
        config.fks.scheduler,
    ));
    let backfill_store = state.backfill_store.clone();
    tokio::spawn(async move {
        scheduler
            .run_forever(move || {
                backfill_store
                    .list_enabled()
                    .unwrap_or_default()
                    .iter()
                    .flat_map(|asset| {
                        let symbol = asset.symbol.clone();
                        asset.intervals.iter().map(move |interval| fks_scheduler::CollectTarget {
                            symbol: symbol.clone(),
                            interval: interval.clone(),
                            limit: 500,
                            provider: None,
                        })
                    })
                    .collect()
            })
            .await;
    });
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fks_data=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(unix)]
async fn shutdown_signal() {
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };
    let sigint = async {
        tokio::signal::ctrl_c().await.expect("install SIGINT handler");
    };
    futures::pin_mut!(sigterm);
    futures::pin_mut!(sigint);
    futures::future::select(sigterm, sigint).await;
}

#[cfg(windows)]
async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("install Ctrl+C handler");
}
