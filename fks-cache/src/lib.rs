//! fks-cache
//!
//! Key derivation and TTL-bound get/set over a shared KV store. The
//! cache is shared by every component that fronts a provider with a result
//! cache: it never blocks the hot path on an internal error — any failure
//! degrades to a cache miss.
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::{de::DeserializeOwned, Serialize};

/// Derive a cache key from an ordered list of request parameters:
/// `provider:arg1:arg2:...`.
#[must_use]
pub fn derive_key(provider: &str, parts: &[&str]) -> String {
    let mut key = provider.to_string();
    for part in parts {
        key.push(':');
        key.push_str(part);
    }
    key
}

/// An entry retained alongside its insertion time so a stale read can still
/// be served on upstream failure, with a warning logged at the call site.
#[derive(Debug, Clone)]
struct Entry {
    payload: Arc<serde_json::Value>,
    inserted_at: std::time::Instant,
}

/// A shared, TTL-bound response cache keyed by provider-derived strings.
///
/// Backed by `moka`'s async cache, which is itself safe for concurrent use
/// across every component that shares it (adapters, the REST surface, the
/// manager's verification step).
#[derive(Clone)]
pub struct ResponseCache {
    inner: Cache<String, Entry>,
}

impl ResponseCache {
    /// Create a cache with the given maximum entry count.
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(max_capacity).build(),
        }
    }

    /// Fetch a typed value for `key` if present and not older than `ttl`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let entry = self.inner.get(key).await?;
        if entry.inserted_at.elapsed() > ttl {
            return None;
        }
        serde_json::from_value(entry.payload.as_ref().clone()).ok()
    }

    /// Fetch a typed value for `key` regardless of its age, for the
    /// stale-on-upstream-failure fallback path.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.inner.get(key).await?;
        serde_json::from_value(entry.payload.as_ref().clone()).ok()
    }

    /// Insert `value` under `key`. TTL enforcement happens at read time via
    /// [`get`](Self::get), so callers pass whatever TTL they intend to apply
    /// consistently at every read site.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let Ok(payload) = serde_json::to_value(value) else {
            // Serialization failures degrade to a cache-miss, not a panic:
            // the cache never blocks the hot path on an internal error.
            return;
        };
        self.inner
            .insert(
                key.to_string(),
                Entry {
                    payload: Arc::new(payload),
                    inserted_at: std::time::Instant::now(),
                },
            )
            .await;
    }

    /// Remove a key (used when callers want to force a refetch).
    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}
