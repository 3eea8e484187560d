//! Client-side rate limiter (C2): bounds the rate of calls this service
//! makes against the upstream registry API.
//!
//! ```rust
//! use registry_ratelimiter::{RateLimiter, RateLimiterConfig};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(RateLimiterConfig::new(10, Duration::from_secs(1)));
//! limiter.acquire().await; // blocks until a slot is free
//! let _ = limiter.try_acquire(); // never blocks
//! # }
//! ```
//!
//! A [`MultiTierRateLimiter`] enforces several `(requests, window)` pairs at
//! once (e.g. 10/s *and* 100/min), satisfying each tier in order.

mod config;
mod error;
mod limiter;

pub use config::RateLimiterConfig;
pub use error::RateLimitExceeded;
pub use limiter::{MultiTierRateLimiter, RateLimiter};
