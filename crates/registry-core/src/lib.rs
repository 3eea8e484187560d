//! Shared infrastructure for the coordinated caching data service:
//! - Stable error taxonomy ([`CoreError`], [`ErrorKind`]) with correlation ids
//! - Exponential backoff schedules shared by the token manager and upstream
//!   client retry logic

pub mod backoff;
pub mod correlation;
pub mod error;

pub use backoff::{ExponentialBackoff, IntervalFunction};
pub use correlation::CorrelationId;
pub use error::{CoreError, ErrorKind};
