use registry_core::CorrelationId;
use std::time::Duration;

/// One completed public call: exactly one of these is produced per
/// request.
#[derive(Debug, Clone)]
pub struct RequestLogEntry {
    pub endpoint: String,
    pub outcome: Outcome,
    pub cache_hit: bool,
    pub latency: Duration,
    pub correlation_id: CorrelationId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotFound,
    ValidationError,
    UpstreamError,
    CircuitOpen,
    Internal,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::NotFound => "not_found",
            Outcome::ValidationError => "validation_error",
            Outcome::UpstreamError => "upstream_error",
            Outcome::CircuitOpen => "circuit_open",
            Outcome::Internal => "internal",
        }
    }
}
