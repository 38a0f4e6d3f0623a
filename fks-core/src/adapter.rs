//! The adapter contract: a uniform lifecycle of rate-limiting, retry
//! with exponential backoff+jitter, and normalization around two
//! provider-supplied hooks. This is deliberately a capability composed by a
//! generic wrapper rather than a trait hierarchy: `BuildRequest` and
//! `NormalizeResponse` are the only things a concrete adapter implements;
//! `Adapter<A>` supplies the shared lifecycle and is what callers use.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fks_types::config::BackoffConfig;
use fks_types::{CanonicalFetchResult, FetchRequest, FksError};
use rand::Rng;

/// A fully built HTTP request description: URL, query parameters, and
/// headers, as produced by an adapter's `build_request` hook.
#[derive(Debug, Clone)]
pub struct HttpRequestSpec {
    /// Fully-qualified request URL.
    pub url: String,
    /// Query parameters to attach to the request.
    pub query: Vec<(String, String)>,
    /// Headers to attach to the request (e.g. authentication).
    pub headers: Vec<(String, String)>,
}

/// The two hooks a concrete provider adapter implements.
///
/// Everything else — rate limiting, retry, timeout, row-level error
/// tolerance — is supplied by [`Adapter`].
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable adapter name, e.g. `"binance"`.
    fn name(&self) -> &'static str;

    /// Requests-per-second limit for this adapter, if rate-limited.
    fn rate_limit_per_sec(&self) -> Option<f64> {
        None
    }

    /// Build the HTTP request for `request`.
    fn build_request(&self, request: &FetchRequest) -> Result<HttpRequestSpec, FksError>;

    /// Normalize a raw JSON payload into a [`CanonicalFetchResult`].
    ///
    /// Malformed individual rows are skipped, not fatal; only a structural
    /// mismatch (wrong top-level shape, a provider error envelope) should
    /// return `Err`.
    fn normalize(
        &self,
        raw: serde_json::Value,
        request: &FetchRequest,
    ) -> Result<CanonicalFetchResult, FksError>;
}

/// Intra-process, single-instance rate limiter: sleeps until at least
/// `1/rps` has elapsed since the previous call on this adapter instance.
///
/// Intra-process only; this is explicitly not a distributed limiter.
#[derive(Debug, Default)]
pub struct RateGate {
    last_call_micros: AtomicI64,
}

impl RateGate {
    /// Wait, if necessary, so that at least `1/rps` seconds have elapsed
    /// since the previous call.
    pub async fn wait(&self, rps: f64) {
        if rps <= 0.0 {
            return;
        }
        let min_interval = Duration::from_secs_f64(1.0 / rps);
        let now = now_micros();
        let prev = self.last_call_micros.swap(now, Ordering::SeqCst);
        if prev == 0 {
            return;
        }
        let elapsed = Duration::from_micros((now - prev).max(0) as u64);
        if elapsed < min_interval {
            tokio::time::sleep(min_interval - elapsed).await;
        }
    }
}

fn now_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// The HTTP execution hook: injectable so tests can run the full adapter
/// lifecycle (rate limit, retry, normalize) against a fixture client.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Execute an HTTP GET against `spec` with the given `timeout`, returning
    /// the parsed JSON body.
    async fn execute(
        &self,
        spec: &HttpRequestSpec,
        timeout: Duration,
    ) -> Result<serde_json::Value, FksError>;
}

/// A [`HttpExecutor`] backed by a real `reqwest::Client`.
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    /// Wrap an existing `reqwest::Client`.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestExecutor {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(
        &self,
        spec: &HttpRequestSpec,
        timeout: Duration,
    ) -> Result<serde_json::Value, FksError> {
        let mut builder = self.client.get(&spec.url).query(&spec.query).timeout(timeout);
        for (k, v) in &spec.headers {
            builder = builder.header(k, v);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| FksError::data_fetch("http", e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(FksError::RateLimited {
                    provider: "http".to_string(),
                    retry_after_ms: None,
                });
            }
            return Err(FksError::data_fetch(
                "http",
                format!("status {status}"),
            ));
        }
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| FksError::data_fetch("http", e.to_string()))
    }
}

/// Wraps a [`ProviderAdapter`] with the shared lifecycle: rate-limit gate,
/// build, retried execution, normalize.
pub struct Adapter<A: ProviderAdapter> {
    inner: A,
    executor: Box<dyn HttpExecutor>,
    gate: RateGate,
    timeout: Duration,
    backoff: BackoffConfig,
}

impl<A: ProviderAdapter> Adapter<A> {
    /// Wrap `inner` with a real reqwest-backed executor and the given
    /// timeout/backoff policy.
    #[must_use]
    pub fn new(inner: A, timeout: Duration, backoff: BackoffConfig) -> Self {
        Self {
            inner,
            executor: Box::new(ReqwestExecutor::default()),
            gate: RateGate::default(),
            timeout,
            backoff,
        }
    }

    /// Wrap `inner` with a custom [`HttpExecutor`] (used by tests to inject
    /// deterministic fixtures).
    #[must_use]
    pub fn with_executor(
        inner: A,
        executor: Box<dyn HttpExecutor>,
        timeout: Duration,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            inner,
            executor,
            gate: RateGate::default(),
            timeout,
            backoff,
        }
    }

    /// The wrapped adapter's stable name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Run the full lifecycle: rate-limit gate, build, retried execution,
    /// normalize.
    ///
    /// # Errors
    /// Returns `FksError::DataFetch` if every retry attempt fails, or
    /// whatever structural error `normalize` raises.
    pub async fn fetch(&self, request: &FetchRequest) -> Result<CanonicalFetchResult, FksError> {
        if let Some(rps) = self.inner.rate_limit_per_sec() {
            self.gate.wait(rps).await;
        }
        let spec = self.inner.build_request(request)?;
        let raw = self.execute_with_retries(&spec).await?;
        self.inner.normalize(raw, request)
    }

    async fn execute_with_retries(
        &self,
        spec: &HttpRequestSpec,
    ) -> Result<serde_json::Value, FksError> {
        let max_attempts = self.backoff.max_retries + 1;
        let mut last_err: Option<FksError> = None;
        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = self.backoff_delay(attempt - 1);
                tokio::time::sleep(delay).await;
            }
            match self.executor.execute(spec, self.timeout).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(provider = self.inner.name(), attempt, error = %e, "adapter retry");
                    last_err = Some(e);
                }
            }
        }
        Err(FksError::data_fetch(
            self.inner.name(),
            format!(
                "failed after {} attempts: {}",
                max_attempts,
                last_err.map_or_else(|| "unknown".to_string(), |e| e.to_string())
            ),
        ))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.backoff.base_delay(attempt);
        let jitter_max = self.backoff.jitter.as_secs_f64();
        let jitter = if jitter_max > 0.0 {
            rand::rng().random_range(0.0..jitter_max)
        } else {
            0.0
        };
        base + Duration::from_secs_f64(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct EchoAdapter;

    #[async_trait]
    impl ProviderAdapter for EchoAdapter {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn build_request(&self, _request: &FetchRequest) -> Result<HttpRequestSpec, FksError> {
            Ok(HttpRequestSpec {
                url: "http://example.invalid/echo".to_string(),
                query: vec![],
                headers: vec![],
            })
        }

        fn normalize(
            &self,
            raw: serde_json::Value,
            request: &FetchRequest,
        ) -> Result<CanonicalFetchResult, FksError> {
            if !raw.is_array() {
                return Err(FksError::Validation {
                    provider: "echo".to_string(),
                    message: "expected array".to_string(),
                });
            }
            Ok(CanonicalFetchResult {
                provider: "echo".to_string(),
                data: vec![],
                request: request.clone(),
            })
        }
    }

    struct FlakyExecutor {
        fail_times: AtomicUsize,
        succeed_payload: serde_json::Value,
    }

    #[async_trait]
    impl HttpExecutor for FlakyExecutor {
        async fn execute(
            &self,
            _spec: &HttpRequestSpec,
            _timeout: Duration,
        ) -> Result<serde_json::Value, FksError> {
            let remaining = self.fail_times.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(FksError::data_fetch("echo", "transient"));
            }
            Ok(self.succeed_payload.clone())
        }
    }

    fn req() -> FetchRequest {
        FetchRequest {
            symbol: "BTCUSDT".to_string(),
            interval: "1h".to_string(),
            start: None,
            end: None,
            limit: None,
        }
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let executor = Arc::new(FlakyExecutor {
            fail_times: AtomicUsize::new(2),
            succeed_payload: serde_json::json!([]),
        });
        let adapter = Adapter::with_executor(
            EchoAdapter,
            Box::new(ArcExecutor(executor)),
            Duration::from_secs(1),
            BackoffConfig {
                max_retries: 2,
                base: Duration::from_millis(1),
                jitter: Duration::from_millis(0),
            },
        );
        let result = adapter.fetch(&req()).await.unwrap();
        assert_eq!(result.provider, "echo");
    }

    #[tokio::test]
    async fn exhausts_retries_and_wraps_error() {
        let executor = Arc::new(FlakyExecutor {
            fail_times: AtomicUsize::new(10),
            succeed_payload: serde_json::json!([]),
        });
        let adapter = Adapter::with_executor(
            EchoAdapter,
            Box::new(ArcExecutor(executor)),
            Duration::from_secs(1),
            BackoffConfig {
                max_retries: 1,
                base: Duration::from_millis(1),
                jitter: Duration::from_millis(0),
            },
        );
        let err = adapter.fetch(&req()).await.unwrap_err();
        assert!(matches!(err, FksError::DataFetch { .. }));
    }

    struct ArcExecutor(Arc<FlakyExecutor>);

    #[async_trait]
    impl HttpExecutor for ArcExecutor {
        async fn execute(
            &self,
            spec: &HttpRequestSpec,
            timeout: Duration,
        ) -> Result<serde_json::Value, FksError> {
            self.0.execute(spec, timeout).await
        }
    }

    #[test]
    fn backoff_base_delay_matches_spec_defaults() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.base_delay(0), Duration::from_millis(300));
        assert_eq!(cfg.base_delay(1), Duration::from_millis(600));
    }
}
