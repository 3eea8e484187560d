use registry_core::{CorrelationId, CoreError, ErrorKind};
use thiserror::Error;

/// Bulk Index (C6) failures, including the shared input validation used by
/// the Query Service before any call reaches the index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BulkIndexError {
    #[error("identifier must be exactly 10 decimal digits")]
    InvalidIdentifier,

    #[error("query length must be between 1 and 200 characters")]
    QueryLength,

    #[error("query contains a rejected control or injection pattern")]
    QueryRejected,

    #[error("limit must be between 1 and 100")]
    InvalidLimit,

    #[error("index store failure: {0}")]
    StoreUnavailable(String),
}

impl BulkIndexError {
    pub fn into_core_error(self, correlation_id: CorrelationId) -> CoreError {
        let kind = match &self {
            BulkIndexError::InvalidIdentifier
            | BulkIndexError::QueryLength
            | BulkIndexError::QueryRejected
            | BulkIndexError::InvalidLimit => ErrorKind::ValidationError,
            BulkIndexError::StoreUnavailable(_) => ErrorKind::CacheUnavailable,
        };
        CoreError::with_correlation(kind, self.to_string(), correlation_id)
    }
}

impl From<sqlx::Error> for BulkIndexError {
    fn from(err: sqlx::Error) -> Self {
        BulkIndexError::StoreUnavailable(err.to_string())
    }
}
