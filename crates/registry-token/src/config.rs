use std::time::Duration;

/// Configuration for the client-credentials exchange against the upstream
/// token endpoint.
#[derive(Debug, Clone)]
pub struct TokenManagerConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    /// Keep a token only until `expiry - safety_buffer`; design default 60s.
    pub safety_buffer: Duration,
    pub max_retries: usize,
    pub retry_base: Duration,
}

impl TokenManagerConfig {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            safety_buffer: Duration::from_millis(60_000),
            max_retries: 3,
            retry_base: Duration::from_millis(1000),
        }
    }

    pub fn with_safety_buffer(mut self, buffer: Duration) -> Self {
        self.safety_buffer = buffer;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_design_values() {
        let config = TokenManagerConfig::new("https://x", "id", "secret", "scope");
        assert_eq!(config.safety_buffer, Duration::from_millis(60_000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_base, Duration::from_millis(1000));
    }
}
