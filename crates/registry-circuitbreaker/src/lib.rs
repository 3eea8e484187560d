//! Circuit breaker (C3): protects the upstream registry from cascading
//! failures.
//!
//! ## States
//! - **Closed**: normal operation; failures increment a counter.
//! - **Open**: every call fails immediately with [`CircuitBreakerError::Open`]
//!   until the recovery timeout elapses.
//! - **HalfOpen**: a limited probe is allowed through; enough consecutive
//!   successes close the circuit, any failure reopens it.
//!
//! State transitions are linearized under a single mutual-exclusion region,
//! so every caller of [`execute`](CircuitBreaker::execute) observes a
//! consistent state at the moment of the check.
//!
//! # Example
//!
//! ```rust
//! use registry_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
//! let result = breaker.execute(|| async { Ok::<_, std::io::Error>(42) }).await?;
//! assert_eq!(result, 42);
//! # Ok(())
//! # }
//! ```

mod circuit;
mod config;
mod error;

pub use circuit::{CircuitSnapshot, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use error::CircuitBreakerError;

use circuit::Circuit;
use std::future::Future;
use std::sync::Arc;

/// Process-wide circuit breaker for the upstream registry API, constructed
/// once at startup and held by the Upstream Client, never stored as
/// global mutable state.
#[derive(Clone)]
pub struct CircuitBreaker {
    circuit: Arc<Circuit>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuit: Arc::new(Circuit::new(config)),
        }
    }

    /// Runs `fn` if the circuit permits it; otherwise fails fast with
    /// [`CircuitBreakerError::Open`] without invoking `fn` at all.
    ///
    /// Only the errors the caller's classifier marks as circuit failures
    /// should reach this call in a failed state — callers (the Upstream
    /// Client) decide which of their own errors count: rate-limit,
    /// non-auth 4xx, and validation errors are not counted as circuit
    /// failures.
    pub async fn execute<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.circuit.check() {
            return Err(CircuitBreakerError::Open);
        }

        match f().await {
            Ok(value) => {
                self.circuit.on_result(true);
                Ok(value)
            }
            Err(err) => {
                self.circuit.on_result(false);
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    /// Like [`execute`](Self::execute) but lets the caller decide, from the
    /// error value, whether this particular failure should count against
    /// the breaker (used by the Upstream Client to exempt rate-limit and
    /// non-auth 4xx responses).
    pub async fn execute_classified<F, Fut, T, E>(
        &self,
        f: F,
        counts_as_failure: impl Fn(&E) -> bool,
    ) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.circuit.check() {
            return Err(CircuitBreakerError::Open);
        }

        match f().await {
            Ok(value) => {
                self.circuit.on_result(true);
                Ok(value)
            }
            Err(err) => {
                if counts_as_failure(&err) {
                    self.circuit.on_result(false);
                }
                Err(CircuitBreakerError::Inner(err))
            }
        }
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        self.circuit.snapshot()
    }

    pub fn state(&self) -> CircuitState {
        self.circuit.snapshot().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn permits_calls_while_closed() {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
        let result = breaker.execute(|| async { Ok::<_, String>(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn trips_open_after_threshold_and_rejects_without_calling() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(3)
                .build(),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let _ = breaker
                .execute(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("boom")
                })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls_before = calls.load(Ordering::SeqCst);
        let result = breaker
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(matches!(result, Err(CircuitBreakerError::Open)));
        assert_eq!(calls.load(Ordering::SeqCst), calls_before);
    }

    #[tokio::test]
    async fn recovers_through_half_open_after_timeout() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .recovery_timeout(Duration::from_millis(20))
                .half_open_required_successes(2)
                .build(),
        );

        let _ = breaker.execute(|| async { Err::<(), _>("boom") }).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;

        let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let _ = breaker.execute(|| async { Ok::<_, &str>(()) }).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn classified_execute_exempts_non_circuit_failures() {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .build(),
        );

        for _ in 0..5 {
            let _ = breaker
                .execute_classified(|| async { Err::<(), _>("rate_limited") }, |_| false)
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
