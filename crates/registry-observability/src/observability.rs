use crate::entry::RequestLogEntry;
use crate::histogram::{Quantiles, RingHistogram};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics")]
use metrics::counter;

/// Observability (C9): the in-process counters and latency histograms
/// this service needs, plus the `record`/`snapshot` contract.
///
/// Counters are atomic; per-endpoint and per-kind breakdowns use a
/// lightweight lock per map, so increments never block a concurrent
/// snapshot read for long.
pub struct Observability {
    started_at: Instant,
    requests_total: Mutex<HashMap<String, u64>>,
    cache_hits_total: AtomicU64,
    cache_misses_total: AtomicU64,
    upstream_calls_total: AtomicU64,
    upstream_errors_total: Mutex<HashMap<String, u64>>,
    circuit_opens_total: AtomicU64,
    end_to_end_latency_ms: Mutex<HashMap<String, RingHistogram>>,
    upstream_latency_ms: RingHistogram,
}

impl Default for Observability {
    fn default() -> Self {
        Self::new()
    }
}

impl Observability {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests_total: Mutex::new(HashMap::new()),
            cache_hits_total: AtomicU64::new(0),
            cache_misses_total: AtomicU64::new(0),
            upstream_calls_total: AtomicU64::new(0),
            upstream_errors_total: Mutex::new(HashMap::new()),
            circuit_opens_total: AtomicU64::new(0),
            end_to_end_latency_ms: Mutex::new(HashMap::new()),
            upstream_latency_ms: RingHistogram::new(),
        }
    }

    /// Appends one Request Log Entry's worth of counters/histograms.
    /// Persisting the entry to the durable `request_log` table is
    /// `registry-cache::CacheStore::append_log`'s job; this tracks the
    /// in-memory hot path for `snapshot()`.
    pub fn record(&self, entry: &RequestLogEntry) {
        *self
            .requests_total
            .lock()
            .entry(entry.endpoint.clone())
            .or_insert(0) += 1;

        if entry.cache_hit {
            self.cache_hits_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses_total.fetch_add(1, Ordering::Relaxed);
        }

        self.end_to_end_latency_ms
            .lock()
            .entry(entry.endpoint.clone())
            .or_insert_with(RingHistogram::new)
            .record(entry.latency.as_secs_f64() * 1000.0);

        #[cfg(feature = "metrics")]
        counter!("requests_total", "endpoint" => entry.endpoint.clone()).increment(1);
    }

    pub fn record_upstream_call(&self, latency: std::time::Duration, error_kind: Option<&str>) {
        self.upstream_calls_total.fetch_add(1, Ordering::Relaxed);
        self.upstream_latency_ms.record(latency.as_secs_f64() * 1000.0);

        if let Some(kind) = error_kind {
            *self
                .upstream_errors_total
                .lock()
                .entry(kind.to_string())
                .or_insert(0) += 1;

            #[cfg(feature = "metrics")]
            counter!("upstream_errors_total", "kind" => kind.to_string()).increment(1);
        }
    }

    pub fn record_circuit_open(&self) {
        self.circuit_opens_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            uptime: self.started_at.elapsed(),
            requests_total: self.requests_total.lock().clone(),
            cache_hits_total: self.cache_hits_total.load(Ordering::Relaxed),
            cache_misses_total: self.cache_misses_total.load(Ordering::Relaxed),
            upstream_calls_total: self.upstream_calls_total.load(Ordering::Relaxed),
            upstream_errors_total: self.upstream_errors_total.lock().clone(),
            circuit_opens_total: self.circuit_opens_total.load(Ordering::Relaxed),
            end_to_end_latency_ms: self
                .end_to_end_latency_ms
                .lock()
                .iter()
                .filter_map(|(endpoint, histogram)| {
                    histogram.quantiles().map(|q| (endpoint.clone(), q))
                })
                .collect(),
            upstream_latency_ms: self.upstream_latency_ms.quantiles(),
        }
    }

    /// Cache-hit rate over everything currently retained (the caller
    /// windows this to the last 24 hours using the durable `request_log`
    /// table when a tighter window is required).
    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits_total.load(Ordering::Relaxed) as f64;
        let misses = self.cache_misses_total.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub uptime: std::time::Duration,
    pub requests_total: HashMap<String, u64>,
    pub cache_hits_total: u64,
    pub cache_misses_total: u64,
    pub upstream_calls_total: u64,
    pub upstream_errors_total: HashMap<String, u64>,
    pub circuit_opens_total: u64,
    pub end_to_end_latency_ms: HashMap<String, Quantiles>,
    pub upstream_latency_ms: Option<Quantiles>,
}
