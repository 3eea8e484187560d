use registry_core::{CorrelationId, CoreError, ErrorKind};
use thiserror::Error;

/// Upstream Client (C4) error taxonomy.
#[derive(Debug, Error, Clone)]
pub enum UpstreamError {
    #[error("circuit open, call not attempted")]
    CircuitOpen,

    #[error("upstream rejected credentials: {0}")]
    Unauthorized(String),

    #[error("upstream rate limited the request: {0}")]
    RateLimited(String),

    #[error("upstream returned a server error: {0}")]
    ServerError(String),

    #[error("upstream call timed out")]
    Timeout,

    #[error("upstream rejected the request as malformed: {0}")]
    BadRequest(String),
}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::CircuitOpen => ErrorKind::CircuitOpen,
            UpstreamError::Unauthorized(_) => ErrorKind::UpstreamUnauthorized,
            UpstreamError::RateLimited(_) => ErrorKind::UpstreamRateLimited,
            UpstreamError::ServerError(_) => ErrorKind::UpstreamServerError,
            UpstreamError::Timeout => ErrorKind::UpstreamTimeout,
            UpstreamError::BadRequest(_) => ErrorKind::UpstreamBadRequest,
        }
    }

    /// Only server errors, timeouts, and network failures count against the
    /// circuit breaker; rate-limit and non-auth 4xx responses
    /// are the upstream's own policy, not ours to penalize.
    pub fn counts_as_circuit_failure(&self) -> bool {
        matches!(self, UpstreamError::ServerError(_) | UpstreamError::Timeout)
    }

    pub fn into_core_error(self, correlation_id: CorrelationId) -> CoreError {
        let kind = self.kind();
        CoreError::with_correlation(kind, self.to_string(), correlation_id)
    }
}
