use std::time::Duration;

/// Configuration for a single sliding-window tier.
///
/// Defaults: `requests` = 10, `window` = 1s, matching the service's
/// configuration surface (`rate_limit.requests`, `rate_limit.window_ms`).
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub requests: usize,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests: 10,
            window: Duration::from_secs(1),
        }
    }
}

impl RateLimiterConfig {
    pub fn new(requests: usize, window: Duration) -> Self {
        Self { requests, window }
    }
}
