//! Per-provider circuit breaker state, owned exclusively by the manager.

use std::time::{Duration, Instant};

use fks_types::config::CircuitBreakerConfig;

/// Circuit breaker state machine for one provider.
///
/// Three consecutive failures open the circuit. While open, the provider is
/// skipped until `cooldown` has elapsed since opening; after that it enters
/// a half-open trial (one attempt allowed). Success closes the circuit and
/// resets the failure count.
#[derive(Debug, Clone)]
pub struct CircuitState {
    failures: u32,
    open_since: Option<Instant>,
    half_open_trial_in_flight: bool,
}

impl Default for CircuitState {
    fn default() -> Self {
        Self {
            failures: 0,
            open_since: None,
            half_open_trial_in_flight: false,
        }
    }
}

impl CircuitState {
    /// Whether a call should currently be skipped: circuit is open and the
    /// cooldown has not yet elapsed, and no half-open trial is already
    /// outstanding.
    #[must_use]
    pub fn should_skip(&self, cfg: &CircuitBreakerConfig) -> bool {
        match self.open_since {
            None => false,
            Some(opened_at) => {
                if self.half_open_trial_in_flight {
                    return true;
                }
                opened_at.elapsed() < cfg.cooldown
            }
        }
    }

    /// Mark that a half-open trial attempt is about to be made (called right
    /// before issuing a request to a circuit that is open but past cooldown).
    pub fn begin_half_open_trial(&mut self) {
        self.half_open_trial_in_flight = true;
    }

    /// Record a successful call: closes the circuit and resets the failure
    /// count.
    pub fn record_success(&mut self) {
        self.failures = 0;
        self.open_since = None;
        self.half_open_trial_in_flight = false;
    }

    /// Record a failed call. Opens the circuit once `failure_threshold`
    /// consecutive failures have accumulated.
    pub fn record_failure(&mut self, cfg: &CircuitBreakerConfig) {
        self.half_open_trial_in_flight = false;
        self.failures += 1;
        if self.failures >= cfg.failure_threshold && self.open_since.is_none() {
            self.open_since = Some(Instant::now());
        }
    }

    /// Milliseconds remaining until the cooldown elapses, if currently open
    /// and within the cooldown window.
    #[must_use]
    pub fn retry_after_ms(&self, cfg: &CircuitBreakerConfig) -> Option<u64> {
        let opened_at = self.open_since?;
        let elapsed = opened_at.elapsed();
        if elapsed >= cfg.cooldown {
            return None;
        }
        Some((cfg.cooldown - elapsed).as_millis() as u64)
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open_since.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(30),
        }
    }

    #[test]
    fn opens_after_three_consecutive_failures() {
        let cfg = cfg();
        let mut state = CircuitState::default();
        assert!(!state.should_skip(&cfg));
        state.record_failure(&cfg);
        state.record_failure(&cfg);
        assert!(!state.is_open());
        state.record_failure(&cfg);
        assert!(state.is_open());
        assert!(state.should_skip(&cfg));
    }

    #[test]
    fn half_open_trial_allowed_once_past_cooldown() {
        let cfg = CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(5),
        };
        let mut state = CircuitState::default();
        state.record_failure(&cfg);
        assert!(state.should_skip(&cfg));
        std::thread::sleep(Duration::from_millis(10));
        assert!(!state.should_skip(&cfg));
        state.begin_half_open_trial();
        assert!(state.should_skip(&cfg));
    }

    #[test]
    fn success_resets_failure_count_and_closes_circuit() {
        let cfg = cfg();
        let mut state = CircuitState::default();
        state.record_failure(&cfg);
        state.record_failure(&cfg);
        state.record_failure(&cfg);
        assert!(state.is_open());
        state.record_success();
        assert!(!state.is_open());
        assert!(!state.should_skip(&cfg));
    }
}
