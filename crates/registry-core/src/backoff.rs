//! Retry backoff schedules shared by the Token Manager and the Upstream
//! Client, which both retry against the same `base * 2^(attempt-1)`
//! exponential schedule.

use std::time::Duration;

/// Computes the delay before a retry attempt.
pub trait IntervalFunction: Send + Sync {
    /// `attempt` is 0-indexed: the delay before the *first* retry is
    /// `next_interval(0)`.
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Exponential backoff with an optional cap and optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    factor: f64,
    max: Option<Duration>,
    jitter: bool,
}

impl ExponentialBackoff {
    /// `base` is the delay before the first retry; each subsequent retry
    /// multiplies the prior delay by `factor`.
    pub fn new(base: Duration, factor: f64) -> Self {
        Self {
            base,
            factor,
            max: None,
            jitter: false,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    /// Randomizes each computed interval uniformly within +/-50%, to avoid
    /// synchronized retries across concurrently-waiting callers.
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let scale = self.factor.powi(attempt as i32);
        let mut interval = self.base.mul_f64(scale);
        if let Some(max) = self.max {
            interval = interval.min(max);
        }
        if self.jitter {
            use rand::Rng;
            let mut rng = rand::rng();
            let factor = rng.random_range(0.5..1.5);
            interval = interval.mul_f64(factor);
        }
        interval
    }
}

/// The design-default schedule used by both C1 (Token Manager) and C4
/// (Upstream Client): base 1000ms, factor 2, attempts `R`=3.
pub fn default_schedule(base_ms: u64) -> ExponentialBackoff {
    ExponentialBackoff::new(Duration::from_millis(base_ms), 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_attempt() {
        let backoff = default_schedule(1000);
        assert_eq!(backoff.next_interval(0), Duration::from_millis(1000));
        assert_eq!(backoff.next_interval(1), Duration::from_millis(2000));
        assert_eq!(backoff.next_interval(2), Duration::from_millis(4000));
    }

    #[test]
    fn caps_at_max() {
        let backoff = default_schedule(1000).with_max(Duration::from_millis(3000));
        assert_eq!(backoff.next_interval(5), Duration::from_millis(3000));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let backoff = default_schedule(1000).with_jitter();
        for attempt in 0..4 {
            let base = Duration::from_millis(1000).mul_f64(2f64.powi(attempt as i32));
            let interval = backoff.next_interval(attempt);
            assert!(interval >= base.mul_f64(0.5));
            assert!(interval <= base.mul_f64(1.5));
        }
    }
}
