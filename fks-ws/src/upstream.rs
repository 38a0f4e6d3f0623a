//! Upstream provider stream multiplexing: one
//! connector manages a single upstream WebSocket (or, absent a native
//! streaming endpoint, a polling loop over the REST manager) carrying
//! the union of every client's subscribed `(symbol, timeframe)` pairs.

use std::collections::HashSet;

use async_trait::async_trait;
use fks_types::FksError;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::protocol::FanoutEvent;

/// A running upstream connection, tracked so the fan-out controller can
/// tear it down when the subscribed pair set changes: the controller
/// recomputes the union and, if it changed, reconnects.
pub struct UpstreamHandle {
    task: JoinHandle<()>,
}

impl UpstreamHandle {
    /// Stop the upstream connection's listen loop.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Establishes (or re-establishes) an upstream stream carrying `pairs`
/// and forwards normalized events onto `tx`. Implementations must not
/// block the caller: `connect` spawns its own listen-loop task and
/// returns immediately with a handle to it.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    /// Open an upstream connection subscribed to `pairs`, forwarding
    /// normalized events to `tx` until the returned handle is aborted.
    ///
    /// # Errors
    /// Returns `FksError` if the upstream connection cannot be
    /// established at all (a mid-stream failure is instead reported as
    /// the listen-loop task simply ending; the fan-out controller
    /// reconnects on the next union-pair recomputation).
    async fn connect(
        &self,
        pairs: HashSet<(String, String)>,
        tx: UnboundedSender<FanoutEvent>,
    ) -> Result<UpstreamHandle, FksError>;
}

/// A connector backed by polling the REST/manager fetch path on a fixed
/// cadence instead of a native provider push stream. Providers without
/// a streaming endpoint (most of this workspace's adapter set) are
/// multiplexed this way: the polling loop is itself the "upstream listen
/// loop" the concurrency rule refers to.
pub struct PollingConnector {
    manager: std::sync::Arc<fks_manager::MultiProviderManager>,
    poll_interval: std::time::Duration,
}

impl PollingConnector {
    /// Build a connector polling `manager` every `poll_interval`.
    #[must_use]
    pub fn new(manager: std::sync::Arc<fks_manager::MultiProviderManager>, poll_interval: std::time::Duration) -> Self {
        Self {
            manager,
            poll_interval,
        }
    }
}

#[async_trait]
impl UpstreamConnector for PollingConnector {
    async fn connect(
        &self,
        pairs: HashSet<(String, String)>,
        tx: UnboundedSender<FanoutEvent>,
    ) -> Result<UpstreamHandle, FksError> {
        let manager = self.manager.clone();
        let interval = self.poll_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                for (symbol, timeframe) in &pairs {
                    let request = fks_types::FetchRequest {
                        symbol: symbol.clone(),
                        interval: timeframe.clone(),
                        start: None,
                        end: None,
                        limit: Some(1),
                    };
                    match manager.fetch(&request).await {
                        Ok(result) => {
                            for row in result.data {
                                let event = FanoutEvent {
                                    symbol: symbol.clone(),
                                    interval: Some(timeframe.clone()),
                                    row,
                                };
                                if tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(_e) => {
                            #[cfg(feature = "tracing")]
                            tracing::debug!(symbol, timeframe, error = %_e, "upstream poll failed");
                        }
                    }
                }
            }
        });
        Ok(UpstreamHandle { task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fks_types::{CanonicalFetchResult, CircuitBreakerConfig, FetchRequest, MarketBar, NormalizedRow, VerificationConfig};
    use std::sync::Arc;
    use std::time::Duration;

    struct OneShotFetcher;

    #[async_trait]
    impl fks_manager::Fetcher for OneShotFetcher {
        fn provider_name(&self) -> &'static str {
            "mock"
        }
        async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
            Ok(CanonicalFetchResult {
                provider: "mock".to_string(),
                data: vec![NormalizedRow::Bar(MarketBar {
                    ts: 0,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                })],
                request: request.clone(),
            })
        }
    }

    #[tokio::test]
    async fn polling_connector_forwards_events() {
        let manager = Arc::new(fks_manager::MultiProviderManager::new(
            vec![Arc::new(OneShotFetcher)],
            CircuitBreakerConfig::default(),
            VerificationConfig {
                enabled: false,
                tolerance: 0.0,
            },
        ));
        let connector = PollingConnector::new(manager, Duration::from_millis(5));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut pairs = HashSet::new();
        pairs.insert(("BTCUSDT".to_string(), "1h".to_string()));
        let handle = connector.connect(pairs, tx).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");
        assert_eq!(event.symbol, "BTCUSDT");
        handle.abort();
    }
}
