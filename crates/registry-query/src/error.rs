use registry_bulkindex::BulkIndexError;
use registry_cache::CacheError;
use registry_coalesce::CoalesceError;
use registry_core::{CorrelationId, CoreError, ErrorKind};
use registry_upstream::UpstreamError;
use thiserror::Error;

/// Query Service (C8) error taxonomy: the union of every component error
/// this service can surface, collapsed to a stable set of tags at the
/// public boundary.
#[derive(Debug, Error, Clone)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),

    #[error("identifier or document year not found")]
    NotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("durable store unavailable: {0}")]
    CacheUnavailable(String),
}

impl QueryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::Validation(_) => ErrorKind::ValidationError,
            QueryError::NotFound => ErrorKind::NotFound,
            QueryError::Upstream(err) => err.kind(),
            QueryError::CacheUnavailable(_) => ErrorKind::CacheUnavailable,
        }
    }

    pub fn into_core_error(self, correlation_id: CorrelationId) -> CoreError {
        let kind = self.kind();
        CoreError::with_correlation(kind, self.to_string(), correlation_id)
    }
}

impl From<BulkIndexError> for QueryError {
    fn from(err: BulkIndexError) -> Self {
        match err {
            BulkIndexError::StoreUnavailable(msg) => QueryError::CacheUnavailable(msg),
            other => QueryError::Validation(other.to_string()),
        }
    }
}

impl From<CacheError> for QueryError {
    fn from(err: CacheError) -> Self {
        QueryError::CacheUnavailable(err.to_string())
    }
}

impl From<CoalesceError<QueryError>> for QueryError {
    fn from(err: CoalesceError<QueryError>) -> Self {
        match err {
            CoalesceError::Leader(inner) => inner,
            CoalesceError::LeaderCancelled => {
                QueryError::CacheUnavailable("singleflight leader cancelled".into())
            }
            CoalesceError::RecvError => {
                QueryError::CacheUnavailable("singleflight receiver lagged".into())
            }
        }
    }
}
