use parking_lot::Mutex;
use std::collections::VecDeque;

const SAMPLE_CAPACITY: usize = 1000;

/// A fixed-capacity ring buffer of the last 1000 latency samples, used to
/// compute p50/p95/p99 on demand. Oldest samples are
/// dropped once capacity is reached.
pub struct RingHistogram {
    samples: Mutex<VecDeque<f64>>,
}

impl Default for RingHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl RingHistogram {
    pub fn new() -> Self {
        Self {
            samples: Mutex::new(VecDeque::with_capacity(SAMPLE_CAPACITY)),
        }
    }

    pub fn record(&self, value_ms: f64) {
        let mut samples = self.samples.lock();
        if samples.len() == SAMPLE_CAPACITY {
            samples.pop_front();
        }
        samples.push_back(value_ms);
    }

    /// Quantiles over the samples currently in the buffer. `None` if empty.
    pub fn quantiles(&self) -> Option<Quantiles> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

        Some(Quantiles {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantiles {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_quantiles() {
        let histogram = RingHistogram::new();
        assert!(histogram.quantiles().is_none());
    }

    #[test]
    fn quantiles_reflect_recorded_samples() {
        let histogram = RingHistogram::new();
        for ms in 1..=100 {
            histogram.record(ms as f64);
        }
        let q = histogram.quantiles().unwrap();
        assert!((q.p50 - 50.5).abs() < 1.0);
        assert!(q.p95 > q.p50);
        assert!(q.p99 > q.p95);
    }

    #[test]
    fn drops_oldest_sample_past_capacity() {
        let histogram = RingHistogram::new();
        for ms in 0..SAMPLE_CAPACITY + 10 {
            histogram.record(ms as f64);
        }
        let q = histogram.quantiles().unwrap();
        // the lowest 10 samples (0..10) should have been evicted
        assert!(q.p50 >= 10.0);
    }
}
