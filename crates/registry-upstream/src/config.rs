use std::time::Duration;

/// Configuration for the Upstream Client.
#[derive(Debug, Clone)]
pub struct UpstreamClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_base: Duration,
}

impl UpstreamClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(30_000),
            max_retries: 3,
            retry_base: Duration::from_millis(1000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }
}
