//! Query Service (C8): the top-level crate of the coordinated caching data
//! service, exposing `search`, `details`, `documents`, `report`, and
//! `stats` over the durable Cache Store, the Bulk Index, and the
//! resilience-wrapped Upstream Client.
//!
//! Construct one [`QueryService`] per process from a [`ServiceConfig`] and
//! share it behind the `Arc` [`QueryService::new`] already returns:
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use registry_query::{QueryService, ServiceConfig};
//! use registry_cache::FilesystemArtifactStore;
//! use std::sync::Arc;
//!
//! let config = ServiceConfig::from_env()?;
//! let artifacts = Arc::new(FilesystemArtifactStore::new("./artifacts"));
//! let service = QueryService::new(&config, artifacts).await?;
//!
//! let details = service.details("5560001712").await?;
//! println!("{}", details.payload);
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
mod refresh;
mod service;
mod types;

pub use config::{
    CacheSection, CircuitSection, ConfigError, RateLimitSection, ServiceConfig, TokenSection,
    UpstreamSection,
};
pub use error::QueryError;
pub use service::QueryService;
pub use types::{CacheFirstResult, ReportResult, StatsResult};
