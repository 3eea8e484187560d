use registry_core::{CorrelationId, CoreError, ErrorKind};
use thiserror::Error;

/// Cache Store (C5) / Binary-artifact store failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("durable store I/O failure: {0}")]
    Unavailable(String),

    #[error("artifact exceeds the 50 MiB limit")]
    ArtifactTooLarge,

    #[error("artifact MIME type {0} is not an archive or structured-markup format")]
    ArtifactTypeRejected(String),

    #[error("artifact I/O failure: {0}")]
    ArtifactIo(String),
}

impl CacheError {
    /// Every variant maps to `CacheUnavailable`: a read
    /// failure degrades to an upstream fetch and a write failure is logged
    /// without failing the response, so the caller never needs a finer tag.
    pub fn into_core_error(self, correlation_id: CorrelationId) -> CoreError {
        CoreError::with_correlation(ErrorKind::CacheUnavailable, self.to_string(), correlation_id)
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}
