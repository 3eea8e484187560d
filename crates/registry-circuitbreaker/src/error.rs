use thiserror::Error;

/// Errors returned by [`crate::CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; the call was rejected without reaching upstream.
    #[error("circuit is open; call not permitted")]
    Open,

    /// `fn` ran and returned an error.
    #[error("call failed: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::Open)
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            CircuitBreakerError::Open => None,
        }
    }
}
