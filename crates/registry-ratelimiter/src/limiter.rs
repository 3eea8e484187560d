use crate::config::RateLimiterConfig;
use crate::error::RateLimitExceeded;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[cfg(feature = "metrics")]
use metrics::counter;

/// Sliding-window request log: drop timestamps older than
/// `now - window`, admit if under capacity, otherwise report how long the
/// caller must wait for the oldest entry to fall out of the window.
struct Window {
    requests: usize,
    window: Duration,
    log: VecDeque<Instant>,
}

impl Window {
    fn new(config: RateLimiterConfig) -> Self {
        Self {
            requests: config.requests,
            window: config.window,
            log: VecDeque::with_capacity(config.requests),
        }
    }

    /// Returns `Ok(())` if a slot was claimed, or `Err(wait)` with how long
    /// to sleep before retrying.
    fn try_claim(&mut self, now: Instant) -> Result<(), Duration> {
        while let Some(&oldest) = self.log.front() {
            if now.duration_since(oldest) >= self.window {
                self.log.pop_front();
            } else {
                break;
            }
        }

        if self.log.len() < self.requests {
            self.log.push_back(now);
            Ok(())
        } else {
            let oldest = *self.log.front().expect("len >= requests > 0 implies non-empty");
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            Err(wait)
        }
    }
}

/// A single-tier client-side sliding-window rate limiter (C2). Process-local,
/// constructed once per upstream and shared (e.g. inside the Upstream
/// Client).
pub struct RateLimiter {
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            window: Mutex::new(Window::new(config)),
        }
    }

    /// Blocks until a slot is available in the current window.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock();
                match window.try_claim(Instant::now()) {
                    Ok(()) => {
                        #[cfg(feature = "metrics")]
                        counter!("rate_limiter_permits_total", "outcome" => "acquired").increment(1);
                        None
                    }
                    Err(wait) => Some(wait),
                }
            };

            match wait {
                None => return,
                Some(wait) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(?wait, "rate limiter saturated, waiting for a slot");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Never blocks: claims a slot if one is free, otherwise fails.
    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        let mut window = self.window.lock();
        match window.try_claim(Instant::now()) {
            Ok(()) => Ok(()),
            Err(_) => {
                #[cfg(feature = "metrics")]
                counter!("rate_limiter_permits_total", "outcome" => "rejected").increment(1);
                Err(RateLimitExceeded)
            }
        }
    }
}

/// Composes several [`RateLimiter`] tiers (e.g. 10/s AND 100/min);
/// `acquire` satisfies each tier in order, so the effective rate is bounded
/// by the tightest tier.
pub struct MultiTierRateLimiter {
    tiers: Vec<RateLimiter>,
}

impl MultiTierRateLimiter {
    pub fn new(configs: impl IntoIterator<Item = RateLimiterConfig>) -> Self {
        Self {
            tiers: configs.into_iter().map(RateLimiter::new).collect(),
        }
    }

    pub async fn acquire(&self) {
        for tier in &self.tiers {
            tier.acquire().await;
        }
    }

    pub fn try_acquire(&self) -> Result<(), RateLimitExceeded> {
        for tier in &self.tiers {
            tier.try_acquire()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_capacity_then_blocks() {
        tokio::time::pause();
        let limiter = RateLimiter::new(RateLimiterConfig::new(2, Duration::from_millis(100)));

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(limiter.try_acquire().is_err());
    }

    #[tokio::test]
    async fn slot_frees_after_window_elapses() {
        tokio::time::pause();
        let limiter = RateLimiter::new(RateLimiterConfig::new(1, Duration::from_millis(50)));
        limiter.acquire().await;
        assert!(limiter.try_acquire().is_err());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(limiter.try_acquire().is_ok());
    }

    #[tokio::test]
    async fn multi_tier_enforces_tightest_tier() {
        tokio::time::pause();
        let limiter = MultiTierRateLimiter::new([
            RateLimiterConfig::new(10, Duration::from_secs(1)),
            RateLimiterConfig::new(2, Duration::from_secs(60)),
        ]);

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(limiter.try_acquire().is_err());
    }

    #[tokio::test]
    async fn bounded_admission_within_a_window() {
        tokio::time::pause();
        let limiter = RateLimiter::new(RateLimiterConfig::new(10, Duration::from_millis(100)));
        for _ in 0..10 {
            assert!(limiter.try_acquire().is_ok());
        }
        assert!(limiter.try_acquire().is_err());
    }
}
