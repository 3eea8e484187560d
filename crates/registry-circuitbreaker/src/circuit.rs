use crate::config::CircuitBreakerConfig;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// The three states of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view of the breaker for observability / `stats()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: usize,
    pub consecutive_successes: usize,
}

struct Inner {
    state: CircuitState,
    failure_count: usize,
    consecutive_successes: usize,
    opened_at: Option<Instant>,
}

/// The process-wide per-upstream circuit breaker state machine. All
/// transitions are linearized under a single mutual-exclusion region so
/// every observer of [`Circuit::check`]/[`Circuit::on_result`] sees a
/// consistent state.
pub(crate) struct Circuit {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl Circuit {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
            config,
        }
    }

    pub(crate) fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            consecutive_successes: inner.consecutive_successes,
        }
    }

    /// Checks whether a call may proceed, transitioning Open -> HalfOpen
    /// when the recovery timeout has elapsed. Returns `true` if the call is
    /// permitted.
    pub(crate) fn check(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = inner.opened_at.expect("opened_at set when entering Open");
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    #[cfg(feature = "tracing")]
                    tracing::info!("circuit breaker transitioning Open -> HalfOpen");
                    #[cfg(feature = "metrics")]
                    counter!("circuit_breaker_transitions_total", "to" => "half_open").increment(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records the outcome of a permitted call.
    pub(crate) fn on_result(&self, success: bool) {
        let mut inner = self.inner.lock();
        match (inner.state, success) {
            (CircuitState::Closed, true) => {
                inner.failure_count = 0;
            }
            (CircuitState::Closed, false) => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        failure_count = inner.failure_count,
                        "circuit breaker tripped: Closed -> Open"
                    );
                    #[cfg(feature = "metrics")]
                    counter!("circuit_breaker_transitions_total", "to" => "open").increment(1);
                }
            }
            (CircuitState::HalfOpen, true) => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.half_open_required_successes {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    inner.consecutive_successes = 0;
                    #[cfg(feature = "tracing")]
                    tracing::info!("circuit breaker recovered: HalfOpen -> Closed");
                    #[cfg(feature = "metrics")]
                    counter!("circuit_breaker_transitions_total", "to" => "closed").increment(1);
                }
            }
            (CircuitState::HalfOpen, false) => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.consecutive_successes = 0;
                #[cfg(feature = "tracing")]
                tracing::warn!("circuit breaker probe failed: HalfOpen -> Open");
                #[cfg(feature = "metrics")]
                counter!("circuit_breaker_transitions_total", "to" => "open").increment(1);
            }
            (CircuitState::Open, _) => {
                // A call should never be permitted while Open; on_result is
                // only invoked after check() returns true.
            }
        }
    }
}

#[allow(dead_code)]
fn _assert_send_sync() {
    fn assert<T: Send + Sync>() {}
    assert::<Circuit>();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: usize, recovery: Duration, successes: usize) -> Circuit {
        Circuit::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            recovery_timeout: recovery,
            half_open_required_successes: successes,
        })
    }

    #[test]
    fn opens_after_threshold_failures() {
        let circuit = breaker(3, Duration::from_secs(60), 2);
        for _ in 0..2 {
            assert!(circuit.check());
            circuit.on_result(false);
        }
        assert_eq!(circuit.snapshot().state, CircuitState::Closed);
        assert!(circuit.check());
        circuit.on_result(false);
        assert_eq!(circuit.snapshot().state, CircuitState::Open);
    }

    #[test]
    fn rejects_calls_while_open() {
        let circuit = breaker(1, Duration::from_secs(60), 2);
        circuit.on_result(false);
        assert_eq!(circuit.snapshot().state, CircuitState::Open);
        assert!(!circuit.check());
    }

    #[test]
    fn success_in_closed_resets_failure_count() {
        let circuit = breaker(3, Duration::from_secs(60), 2);
        circuit.on_result(false);
        circuit.on_result(false);
        circuit.on_result(true);
        assert_eq!(circuit.snapshot().failure_count, 0);
    }

    #[test]
    fn half_open_requires_consecutive_successes_to_close() {
        let circuit = breaker(1, Duration::from_millis(10), 2);
        circuit.on_result(false);
        assert_eq!(circuit.snapshot().state, CircuitState::Open);

        std::thread::sleep(Duration::from_millis(20));
        assert!(circuit.check());
        assert_eq!(circuit.snapshot().state, CircuitState::HalfOpen);

        circuit.on_result(true);
        assert_eq!(circuit.snapshot().state, CircuitState::HalfOpen);
        circuit.on_result(true);
        assert_eq!(circuit.snapshot().state, CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let circuit = breaker(1, Duration::from_millis(10), 2);
        circuit.on_result(false);
        std::thread::sleep(Duration::from_millis(20));
        assert!(circuit.check());
        circuit.on_result(false);
        assert_eq!(circuit.snapshot().state, CircuitState::Open);
    }
}
