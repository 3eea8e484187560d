use std::fmt;

/// Returned by [`crate::RateLimiter::try_acquire`] when no slot is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitExceeded;

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rate limit exceeded")
    }
}

impl std::error::Error for RateLimitExceeded {}
