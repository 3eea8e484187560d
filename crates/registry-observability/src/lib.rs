//! Observability (C9): Request Log Entry sink, counters, and latency
//! quantiles over a ring buffer of the last 1000 samples per metric.

mod entry;
mod histogram;
mod observability;

pub use entry::{Outcome, RequestLogEntry};
pub use histogram::{Quantiles, RingHistogram};
pub use observability::{Observability, Snapshot};
