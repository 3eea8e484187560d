//! Cache Store (C5) and binary-artifact store for the coordinated caching
//! data service.
//!
//! [`CacheStore`] is a durable, `sqlx`-backed key/value store with three
//! logical tables (details, document-list, report), each tracking
//! `fetch`/`expiry` timestamps so callers can classify a read as fresh,
//! stale, or absent. [`FilesystemArtifactStore`] implements the
//! binary-artifact store contract for downloaded report documents.

mod artifact;
mod config;
mod error;
mod store;

pub use artifact::{annual_report_path, ArtifactStore, FilesystemArtifactStore};
pub use config::CacheStoreConfig;
pub use error::CacheError;
pub use store::{CacheClass, CacheEntry, CacheStore, RequestLogRecord};
