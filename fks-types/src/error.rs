use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the `fks-data` workspace.
///
/// Wraps configuration problems, upstream/provider failures, validation and
/// verification outcomes, persistence failures, and the aggregate raised once
/// every provider in a failover chain has been exhausted.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FksError {
    /// Missing credentials or invalid static configuration. Never retried.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid input argument to an operation.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A provider fetch failed after exhausting its retry policy.
    #[error("{provider} failed: {message}")]
    DataFetch {
        /// Name of the provider adapter that failed.
        provider: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The provider signaled an explicit rate limit (HTTP 429 or an in-body note).
    #[error("rate limited by {provider}: retry_after_ms={retry_after_ms:?}")]
    RateLimited {
        /// Provider that issued the rate-limit signal.
        provider: String,
        /// Provider-specified retry delay, if present.
        retry_after_ms: Option<u64>,
    },

    /// Cross-provider verification exceeded the configured variance tolerance.
    #[error("verification failed for {provider}: {message}")]
    Verification {
        /// Provider whose result failed verification.
        provider: String,
        /// Description of the mismatch.
        message: String,
    },

    /// Structural validation failure during normalization (wrong shape, provider
    /// error envelope). Row-level malformation is skipped silently and never
    /// surfaces as this variant.
    #[error("validation error from {provider}: {message}")]
    Validation {
        /// Provider whose payload failed structural validation.
        provider: String,
        /// Description of the structural mismatch.
        message: String,
    },

    /// A database write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A requested resource could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "quote for AAPL".
        what: String,
    },

    /// The requested capability is not implemented by the target adapter.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// Capability string describing what was requested.
        capability: String,
    },

    /// An individual provider call exceeded its configured timeout.
    #[error("provider timed out: {capability} via {provider}")]
    ProviderTimeout {
        /// Provider that timed out.
        provider: String,
        /// Capability label (e.g. "history", "price").
        capability: String,
    },

    /// All attempted providers failed; carries every underlying cause in
    /// attempt order.
    #[error("all providers failed: {0:?}")]
    AllProvidersFailed(Vec<FksError>),

    /// The provider's circuit breaker is open and its cooldown has not elapsed.
    #[error("circuit open for {provider}: retry_after_ms={retry_after_ms}")]
    CircuitOpen {
        /// Provider whose circuit is open.
        provider: String,
        /// Milliseconds remaining until the cooldown elapses.
        retry_after_ms: u64,
    },

    /// Webhook or admin request signature failed verification.
    #[error("signature verification failed")]
    SignatureInvalid,
}

impl FksError {
    /// Build a `DataFetch` error.
    pub fn data_fetch(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFetch {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Build a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Build an `Unsupported` error.
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    /// Build a `ProviderTimeout` error.
    pub fn provider_timeout(provider: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            provider: provider.into(),
            capability: capability.into(),
        }
    }

    /// Whether this error is actionable (worth surfacing to a caller) as
    /// opposed to a benign absence (capability gap, not-found).
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::Unsupported { .. } | Self::NotFound { .. } => false,
            Self::AllProvidersFailed(inner) => inner.iter().any(Self::is_actionable),
            _ => true,
        }
    }

    /// Flatten nested `AllProvidersFailed` aggregates into a single list.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllProvidersFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
