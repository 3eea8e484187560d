//! Stable error taxonomy shared by every component of the coordinated
//! caching data service.
//!
//! Each public operation fails with a [`CoreError`] rather than a
//! component-specific error type. Component crates define their own
//! `thiserror` enums internally (matching the idiom used throughout this
//! workspace) and convert into `CoreError` at their public boundary, so the
//! tag a caller sees is always one of the variants below, never an internal
//! type name or a stack trace.

use crate::correlation::CorrelationId;
use std::fmt;

/// The stable error tag surfaced to callers, carrying a correlation id for
/// cross-referencing logs and a human-readable message for diagnostics.
///
/// Internal detail (upstream response bodies, SQL errors, stack traces) is
/// logged at the point of failure and never embedded in `message`.
#[derive(Debug, Clone, thiserror::Error)]
pub struct CoreError {
    pub kind: ErrorKind,
    pub message: String,
    pub correlation_id: CorrelationId,
}

impl CoreError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            correlation_id: CorrelationId::new(),
        }
    }

    pub fn with_correlation(
        kind: ErrorKind,
        message: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            correlation_id,
        }
    }

    /// True for upstream errors that should count against the circuit
    /// breaker's failure counter (server errors, timeouts, network errors).
    /// Rate-limit, non-auth 4xx, and validation errors are deliberately
    /// excluded per the error propagation policy.
    pub fn counts_as_circuit_failure(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::UpstreamServerError | ErrorKind::UpstreamTimeout | ErrorKind::Internal
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (correlation_id={}): {}",
            self.kind, self.correlation_id, self.message
        )
    }
}

/// Stable tags surfaced to callers. Renaming or reordering a variant is a
/// breaking change to every downstream consumer of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    UpstreamUnauthorized,
    UpstreamRateLimited,
    UpstreamServerError,
    UpstreamTimeout,
    UpstreamBadRequest,
    CircuitOpen,
    CacheUnavailable,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::UpstreamUnauthorized => "UpstreamUnauthorized",
            ErrorKind::UpstreamRateLimited => "UpstreamRateLimited",
            ErrorKind::UpstreamServerError => "UpstreamServerError",
            ErrorKind::UpstreamTimeout => "UpstreamTimeout",
            ErrorKind::UpstreamBadRequest => "UpstreamBadRequest",
            ErrorKind::CircuitOpen => "CircuitOpen",
            ErrorKind::CacheUnavailable => "CacheUnavailable",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_correlation_id() {
        let err = CoreError::new(ErrorKind::NotFound, "no such identifier");
        let rendered = err.to_string();
        assert!(rendered.contains("NotFound"));
        assert!(rendered.contains(&err.correlation_id.to_string()));
    }

    #[test]
    fn circuit_failure_classification_matches_policy() {
        assert!(CoreError::new(ErrorKind::UpstreamServerError, "x").counts_as_circuit_failure());
        assert!(CoreError::new(ErrorKind::UpstreamTimeout, "x").counts_as_circuit_failure());
        assert!(!CoreError::new(ErrorKind::UpstreamRateLimited, "x").counts_as_circuit_failure());
        assert!(!CoreError::new(ErrorKind::UpstreamBadRequest, "x").counts_as_circuit_failure());
        assert!(!CoreError::new(ErrorKind::ValidationError, "x").counts_as_circuit_failure());
    }
}
