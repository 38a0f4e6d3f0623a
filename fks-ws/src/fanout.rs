//! The fan-out controller: owns the upstream
//! connection, recomputes the subscribed union on every registry
//! change, and rebroadcasts normalized events to every connection task
//! via a `broadcast` channel (connection tasks filter by their own
//! subscription before forwarding to the socket).

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, Notify};

use crate::protocol::FanoutEvent;
use crate::registry::SubscriptionRegistry;
use crate::upstream::{UpstreamConnector, UpstreamHandle};

/// Drives the upstream connector in lockstep with the subscription
/// registry's union of `(symbol, timeframe)` pairs.
pub struct FanoutController {
    registry: SubscriptionRegistry,
    connector: Arc<dyn UpstreamConnector>,
    broadcast_tx: broadcast::Sender<FanoutEvent>,
    changed: Arc<Notify>,
    current: Mutex<(HashSet<(String, String)>, Option<UpstreamHandle>)>,
}

impl FanoutController {
    /// Build a controller over `registry`, using `connector` to establish
    /// upstream connections and broadcasting normalized events to up to
    /// `broadcast_capacity` lagging subscribers (a slow connection drops
    /// the oldest events rather than blocking the broadcast).
    #[must_use]
    pub fn new(
        registry: SubscriptionRegistry,
        connector: Arc<dyn UpstreamConnector>,
        broadcast_capacity: usize,
    ) -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(broadcast_capacity.max(16));
        Self {
            registry,
            connector,
            broadcast_tx,
            changed: Arc::new(Notify::new()),
            current: Mutex::new((HashSet::new(), None)),
        }
    }

    /// Subscribe a new connection task to the broadcast stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FanoutEvent> {
        self.broadcast_tx.subscribe()
    }

    /// The shared subscription registry.
    #[must_use]
    pub const fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Signal that the registry changed; wakes [`Self::run`]'s
    /// recomputation loop. Called by connection tasks after every
    /// subscribe/unsubscribe.
    pub fn notify_changed(&self) {
        self.changed.notify_one();
    }

    /// Run forever: on every change signal, recompute the union and
    /// reconnect the upstream if it differs from the currently active
    /// one. Normalized events received from the active upstream are
    /// rebroadcast to every connection task.
    pub async fn run(self: Arc<Self>) {
        let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel::<FanoutEvent>();

        let reconcile_self = self.clone();
        let reconcile_tx = event_tx.clone();
        let reconcile = tokio::spawn(async move {
            loop {
                reconcile_self.changed.notified().await;
                reconcile_self.reconcile(reconcile_tx.clone()).await;
            }
        });

        while let Some(event) = event_rx.recv().await {
            // A send error only means there are currently zero
            // subscribers; the event is simply dropped, matching the
            // "non-blocking per connection" contract.
            let _ = self.broadcast_tx.send(event);
        }
        reconcile.abort();
    }

    async fn reconcile(&self, event_tx: tokio::sync::mpsc::UnboundedSender<FanoutEvent>) {
        let union = self.registry.union_pairs().await;
        let mut state = self.current.lock().await;
        if state.0 == union {
            return;
        }
        if let Some(handle) = state.1.take() {
            handle.abort();
        }
        if union.is_empty() {
            state.0 = union;
            return;
        }
        match self.connector.connect(union.clone(), event_tx).await {
            Ok(handle) => {
                state.0 = union;
                state.1 = Some(handle);
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "failed to establish upstream connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fks_types::{FksError, MarketBar, NormalizedRow};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingConnector {
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UpstreamConnector for CountingConnector {
        async fn connect(
            &self,
            pairs: HashSet<(String, String)>,
            tx: tokio::sync::mpsc::UnboundedSender<FanoutEvent>,
        ) -> Result<UpstreamHandle, FksError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let task = tokio::spawn(async move {
                for (symbol, _) in pairs {
                    let _ = tx.send(FanoutEvent {
                        symbol,
                        interval: None,
                        row: NormalizedRow::Bar(MarketBar {
                            ts: 0,
                            open: 1.0,
                            high: 1.0,
                            low: 1.0,
                            close: 1.0,
                            volume: 1.0,
                        }),
                    });
                }
            });
            Ok(UpstreamHandle { task })
        }
    }

    #[tokio::test]
    async fn reconnects_on_union_change_and_broadcasts_events() {
        let connects = Arc::new(AtomicUsize::new(0));
        let registry = SubscriptionRegistry::new();
        let connector = Arc::new(CountingConnector {
            connects: connects.clone(),
        });
        let controller = Arc::new(FanoutController::new(registry.clone(), connector, 64));
        let mut rx = controller.subscribe();

        let run_handle = tokio::spawn(controller.clone().run());

        let id = registry.register().await;
        registry.subscribe(id, &["BTCUSDT".into()], &["1h".into()], None).await;
        controller.notify_changed();

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("event within timeout")
            .expect("broadcast still open");
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        registry.subscribe(id, &["ETHUSDT".into()], &[], None).await;
        controller.notify_changed();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);

        run_handle.abort();
    }
}
