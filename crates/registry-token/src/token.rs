use std::time::{Duration, Instant};

/// A bearer credential plus the instant it was minted, so expiry can be
/// computed against the configured safety buffer.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    minted_at: Instant,
    ttl: Duration,
}

impl Token {
    pub fn new(access_token: String, token_type: String, ttl: Duration) -> Self {
        Self {
            access_token,
            token_type,
            minted_at: Instant::now(),
            ttl,
        }
    }

    /// True if the token is still valid at least `buffer` into the future.
    pub fn valid_with_buffer(&self, buffer: Duration) -> bool {
        let elapsed = self.minted_at.elapsed();
        elapsed + buffer < self.ttl
    }

    pub fn bearer_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_valid_with_buffer() {
        let token = Token::new("abc".into(), "Bearer".into(), Duration::from_secs(3600));
        assert!(token.valid_with_buffer(Duration::from_secs(60)));
    }

    #[test]
    fn token_within_buffer_of_expiry_is_not_valid() {
        let token = Token::new("abc".into(), "Bearer".into(), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!token.valid_with_buffer(Duration::from_secs(60)));
    }
}
