//! Configuration types shared across adapters, the manager, the scheduler,
//! and the backfill engine. Every field resolves from the environment with
//! the same precedence: constructor argument > a provider-specific env var
//! > a global env var > a built-in default.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Look up the first set environment variable among `names`, in order.
#[must_use]
pub fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|n| std::env::var(n).ok())
}

/// Resolve a provider-specific timeout, falling back through the global
/// default and finally a built-in constant.
#[must_use]
pub fn resolve_timeout(provider_upper: &str, builtin_default: Duration) -> Duration {
    let specific = format!("FKS_{provider_upper}_TIMEOUT");
    if let Some(s) = env_any(&[&specific, "FKS_API_TIMEOUT"])
        && let Ok(secs) = s.parse::<f64>()
    {
        return Duration::from_secs_f64(secs);
    }
    builtin_default
}

/// Resolve a provider-specific requests-per-second limit, if any is
/// configured via environment variables.
#[must_use]
pub fn resolve_rps(provider_upper: &str) -> Option<f64> {
    let specific = format!("FKS_{provider_upper}_RPS");
    env_any(&[&specific, "FKS_DEFAULT_RPS"]).and_then(|s| s.parse::<f64>().ok())
}

/// Retry/backoff policy applied by every adapter around its HTTP execution.
///
/// Backoff before attempt `n` (0-indexed) is `base * 2^n + U[0, jitter)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base backoff duration.
    pub base: Duration,
    /// Maximum additional random jitter added to each backoff.
    pub jitter: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base: Duration::from_millis(300),
            jitter: Duration::from_millis(250),
        }
    }
}

impl BackoffConfig {
    /// Build a `BackoffConfig`, overriding fields from `FKS_API_MAX_RETRIES`,
    /// `FKS_API_BACKOFF_BASE` (seconds), and `FKS_API_BACKOFF_JITTER`
    /// (seconds) when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = std::env::var("FKS_API_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            cfg.max_retries = v;
        }
        if let Some(v) = std::env::var("FKS_API_BACKOFF_BASE")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
        {
            cfg.base = Duration::from_secs_f64(v);
        }
        if let Some(v) = std::env::var("FKS_API_BACKOFF_JITTER")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
        {
            cfg.jitter = Duration::from_secs_f64(v);
        }
        cfg
    }

    /// The backoff delay (excluding jitter) before attempt `n` (0-indexed).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Circuit-breaker policy applied by the multi-provider manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures required to open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial is allowed.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// Cross-provider verification policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Whether verification is performed at all.
    pub enabled: bool,
    /// Fractional variance tolerance between primary and secondary close
    /// prices (default `0.01` = 1%).
    pub tolerance: f64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tolerance: 0.01,
        }
    }
}

/// Cache TTL policy, keyed by row family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheTtlConfig {
    /// TTL for intraday bar responses.
    pub intraday_bars: Duration,
    /// TTL for earnings/fundamentals responses.
    pub earnings: Duration,
    /// TTL for slow-moving fundamentals (e.g. company profile) responses.
    pub fundamentals: Duration,
    /// TTL applied to REST `/price` results.
    pub rest_price: Duration,
    /// TTL applied to REST `/ohlcv` results.
    pub rest_ohlcv: Duration,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            intraday_bars: Duration::from_secs(300),
            earnings: Duration::from_secs(3600),
            fundamentals: Duration::from_secs(86_400),
            rest_price: Duration::from_secs(60),
            rest_ohlcv: Duration::from_secs(300),
        }
    }
}

/// Scheduler cadence and resource bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the periodic plan fans out tasks.
    pub tick_interval: Duration,
    /// Maximum number of collection tasks running concurrently.
    pub max_concurrency: usize,
    /// Hard wall-clock limit per task.
    pub hard_timeout: Duration,
    /// Soft wall-clock limit per task (logged as a warning, not enforced).
    pub soft_timeout: Duration,
    /// Maximum retry attempts per task.
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(300),
            max_concurrency: 8,
            hard_timeout: Duration::from_secs(300),
            soft_timeout: Duration::from_secs(240),
            max_retries: 3,
        }
    }
}

/// Backfill walk policy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Minimum delay between successive chunk iterations of the walk.
    pub rate_delay: Duration,
    /// Fraction of missing rows in a chunk above which it is rejected
    /// (the chunk's cursor still advances; only the write is skipped).
    pub max_missing_pct: f64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            rate_delay: Duration::from_secs(1),
            max_missing_pct: 0.5,
        }
    }
}

/// Aggregate configuration for the `fks-data` service, resolved once at
/// startup and threaded explicitly through the components that need it
/// (no hidden globals).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FksConfig {
    /// Retry/backoff policy for provider HTTP calls.
    pub backoff: BackoffConfig,
    /// Circuit-breaker policy for the multi-provider manager.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Cross-provider verification policy.
    pub verification: VerificationConfig,
    /// Cache TTL policy.
    pub cache_ttl: CacheTtlConfig,
    /// Scheduler cadence and bounds.
    pub scheduler: SchedulerConfig,
    /// Backfill walk policy.
    pub backfill: BackfillConfig,
    /// Per-provider request timeout default.
    pub provider_timeout: Duration,
}

impl Default for FksConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            verification: VerificationConfig::default(),
            cache_ttl: CacheTtlConfig::default(),
            scheduler: SchedulerConfig::default(),
            backfill: BackfillConfig::default(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

/// Builder for [`FksConfig`], mirroring the const-fn modifier style used
/// across the workspace's other builders.
#[derive(Debug, Default)]
pub struct FksConfigBuilder {
    cfg: FksConfig,
}

impl FksConfigBuilder {
    /// Start from built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cfg: FksConfig::default(),
        }
    }

    /// Start from environment-resolved defaults (`FKS_API_*` backoff knobs).
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            cfg: FksConfig {
                backoff: BackoffConfig::from_env(),
                ..FksConfig::default()
            },
        }
    }

    /// Override the retry/backoff policy.
    #[must_use]
    pub const fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.cfg.backoff = backoff;
        self
    }

    /// Override the circuit-breaker policy.
    #[must_use]
    pub const fn circuit_breaker(mut self, cb: CircuitBreakerConfig) -> Self {
        self.cfg.circuit_breaker = cb;
        self
    }

    /// Override the verification policy.
    #[must_use]
    pub const fn verification(mut self, v: VerificationConfig) -> Self {
        self.cfg.verification = v;
        self
    }

    /// Override the default per-provider request timeout.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Finalize the configuration.
    #[must_use]
    pub fn build(self) -> FksConfig {
        self.cfg
    }
}
