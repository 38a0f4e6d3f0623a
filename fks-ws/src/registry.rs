//! Per-connection subscription state: `{symbols,
//! timeframes, provider?}`. Mutated only from the owning connection's
//! task or the fan-out control path, never directly from the upstream
//! listen loop.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Stable identifier for one live WebSocket connection.
pub type ConnectionId = u64;

/// One connection's subscription record.
#[derive(Debug, Clone, Default)]
pub struct Subscription {
    /// Subscribed instrument symbols.
    pub symbols: HashSet<String>,
    /// Subscribed intervals/timeframes.
    pub timeframes: HashSet<String>,
    /// Upstream provider pinned for this connection, if any.
    pub provider: Option<String>,
}

impl Subscription {
    fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.timeframes.is_empty()
    }
}

/// Shared table of every live connection's subscription, plus the
/// union `(symbol, timeframe)` pair set the fan-out controller needs to
/// keep its upstream connection(s) in sync with.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionRegistry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection id and register an empty subscription
    /// for it.
    pub async fn register(&self) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.write().await.insert(id, Subscription::default());
        id
    }

    /// Remove a connection's subscription entirely (on disconnect).
    pub async fn remove(&self, id: ConnectionId) {
        self.inner.write().await.remove(&id);
    }

    /// Merge `symbols`/`timeframes` into `id`'s subscription, optionally
    /// pinning `provider`. Returns the subscription's new snapshot.
    pub async fn subscribe(
        &self,
        id: ConnectionId,
        symbols: &[String],
        timeframes: &[String],
        provider: Option<String>,
    ) -> Subscription {
        let mut table = self.inner.write().await;
        let entry = table.entry(id).or_default();
        entry.symbols.extend(symbols.iter().cloned());
        entry.timeframes.extend(timeframes.iter().cloned());
        if provider.is_some() {
            entry.provider = provider;
        }
        entry.clone()
    }

    /// Remove `symbols`/`timeframes` from `id`'s subscription. Returns the
    /// subscription's new snapshot.
    pub async fn unsubscribe(
        &self,
        id: ConnectionId,
        symbols: &[String],
        timeframes: &[String],
    ) -> Subscription {
        let mut table = self.inner.write().await;
        let entry = table.entry(id).or_default();
        for s in symbols {
            entry.symbols.remove(s);
        }
        for t in timeframes {
            entry.timeframes.remove(t);
        }
        entry.clone()
    }

    /// Whether `id`'s current subscription includes `symbol`. Connections
    /// with no symbols registered yet never match (an empty subscription
    /// is "not subscribed", not "subscribed to everything").
    pub async fn matches(&self, id: ConnectionId, symbol: &str) -> bool {
        self.inner
            .read()
            .await
            .get(&id)
            .is_some_and(|s| !s.is_empty() && s.symbols.contains(symbol))
    }

    /// The union of every connection's `(symbol, timeframe)` pairs,
    /// recomputed fresh on every subscription/unsubscription change.
    pub async fn union_pairs(&self) -> HashSet<(String, String)> {
        let table = self.inner.read().await;
        let mut out = HashSet::new();
        for sub in table.values() {
            for symbol in &sub.symbols {
                for timeframe in &sub.timeframes {
                    out.insert((symbol.clone(), timeframe.clone()));
                }
            }
        }
        out
    }

    /// Number of live connections, for `/health`-style reporting.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_merges_into_existing_sets() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register().await;
        registry
            .subscribe(id, &["BTCUSDT".into()], &["1h".into()], None)
            .await;
        let sub = registry
            .subscribe(id, &["ETHUSDT".into()], &[], None)
            .await;
        assert_eq!(sub.symbols.len(), 2);
        assert_eq!(sub.timeframes.len(), 1);
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_named_entries() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register().await;
        registry
            .subscribe(id, &["BTCUSDT".into(), "ETHUSDT".into()], &["1h".into()], None)
            .await;
        let sub = registry.unsubscribe(id, &["BTCUSDT".into()], &[]).await;
        assert!(!sub.symbols.contains("BTCUSDT"));
        assert!(sub.symbols.contains("ETHUSDT"));
    }

    #[tokio::test]
    async fn union_pairs_recomputes_across_connections() {
        let registry = SubscriptionRegistry::new();
        let a = registry.register().await;
        let b = registry.register().await;
        registry.subscribe(a, &["BTCUSDT".into()], &["1h".into()], None).await;
        registry.subscribe(b, &["ETHUSDT".into()], &["1h".into(), "1d".into()], None).await;
        let union = registry.union_pairs().await;
        assert!(union.contains(&("BTCUSDT".to_string(), "1h".to_string())));
        assert!(union.contains(&("ETHUSDT".to_string(), "1h".to_string())));
        assert!(union.contains(&("ETHUSDT".to_string(), "1d".to_string())));
        assert_eq!(union.len(), 3);
    }

    #[tokio::test]
    async fn matches_is_false_for_unsubscribed_connection() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register().await;
        assert!(!registry.matches(id, "BTCUSDT").await);
        registry.subscribe(id, &["BTCUSDT".into()], &["1h".into()], None).await;
        assert!(registry.matches(id, "BTCUSDT").await);
        assert!(!registry.matches(id, "ETHUSDT").await);
    }

    #[tokio::test]
    async fn remove_drops_connection_from_union() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register().await;
        registry.subscribe(id, &["BTCUSDT".into()], &["1h".into()], None).await;
        registry.remove(id).await;
        assert!(registry.union_pairs().await.is_empty());
        assert_eq!(registry.connection_count().await, 0);
    }
}
