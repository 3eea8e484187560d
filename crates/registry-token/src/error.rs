use registry_core::{CorrelationId, CoreError, ErrorKind};
use thiserror::Error;

/// Failures the Token Manager (C1) can surface to its caller.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token endpoint rejected the credentials (non-retryable, 4xx).
    #[error("token endpoint rejected credentials: {0}")]
    Unauthorized(String),

    /// Every retry attempt was exhausted without a usable token.
    #[error("token fetch failed after retries: {0}")]
    FetchFailed(String),
}

impl TokenError {
    pub fn into_core_error(self, correlation_id: CorrelationId) -> CoreError {
        let kind = match &self {
            TokenError::Unauthorized(_) => ErrorKind::UpstreamUnauthorized,
            TokenError::FetchFailed(_) => ErrorKind::UpstreamServerError,
        };
        CoreError::with_correlation(kind, self.to_string(), correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_upstream_unauthorized() {
        let err = TokenError::Unauthorized("bad client_id".into());
        let core = err.into_core_error(CorrelationId::new());
        assert_eq!(core.kind, ErrorKind::UpstreamUnauthorized);
    }
}
