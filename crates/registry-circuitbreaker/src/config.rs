use std::time::Duration;

/// Configuration for the consecutive-failure circuit breaker (C3).
///
/// Defaults match the design defaults in the service's configuration
/// surface: failure threshold 5, recovery timeout 60s, 2 consecutive
/// half-open successes required to close.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub recovery_timeout: Duration,
    pub half_open_required_successes: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_required_successes: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: Option<usize>,
    recovery_timeout: Option<Duration>,
    half_open_required_successes: Option<usize>,
}

impl CircuitBreakerConfigBuilder {
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = Some(threshold);
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = Some(timeout);
        self
    }

    pub fn half_open_required_successes(mut self, successes: usize) -> Self {
        self.half_open_required_successes = Some(successes);
        self
    }

    pub fn build(self) -> CircuitBreakerConfig {
        let defaults = CircuitBreakerConfig::default();
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            recovery_timeout: self.recovery_timeout.unwrap_or(defaults.recovery_timeout),
            half_open_required_successes: self
                .half_open_required_successes
                .unwrap_or(defaults.half_open_required_successes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.half_open_required_successes, 2);
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = CircuitBreakerConfig::builder()
            .failure_threshold(3)
            .recovery_timeout(Duration::from_secs(10))
            .half_open_required_successes(1)
            .build();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.recovery_timeout, Duration::from_secs(10));
        assert_eq!(config.half_open_required_successes, 1);
    }
}
