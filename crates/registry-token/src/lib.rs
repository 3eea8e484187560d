//! Token Manager (C1): serializes client-credentials token exchange against
//! the upstream registry's token endpoint.
//!
//! ```rust,no_run
//! use registry_token::{TokenManager, TokenManagerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = TokenManager::new(TokenManagerConfig::new(
//!     "https://api.example/token",
//!     "client-id",
//!     "client-secret",
//!     "registry.read",
//! ));
//! let token = manager.acquire().await?;
//! let _ = token.bearer_header();
//! # Ok(())
//! # }
//! ```
//!
//! At most one token-endpoint call is ever in flight: concurrent callers
//! that observe a stale snapshot block on the same `tokio::sync::Mutex`
//! critical section and share its result.

mod config;
mod error;
mod manager;
mod token;

pub use config::TokenManagerConfig;
pub use error::TokenError;
pub use manager::TokenManager;
pub use token::Token;
