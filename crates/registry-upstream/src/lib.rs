//! Upstream Client (C4): the only component that talks to the upstream
//! registry API, composing the Token Manager, Rate Limiter, and Circuit
//! Breaker ahead of every HTTP exchange.

mod client;
mod config;
mod error;

pub use client::UpstreamClient;
pub use config::UpstreamClientConfig;
pub use error::UpstreamError;
