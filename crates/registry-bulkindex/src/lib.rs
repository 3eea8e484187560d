//! Bulk Index (C6): a pre-loaded, read-only registry record store used for
//! `search` and identifier `lookup` without upstream contact.
//!
//! Input validation (`validate` module) sanitizes free-text queries and
//! identifiers before they reach the index; it is also used by
//! `registry-query` at the Query Service boundary.

mod error;
mod index;
mod record;
mod validate;

pub use error::BulkIndexError;
pub use index::BulkIndex;
pub use record::RegistryRecord;
pub use validate::{validate_identifier, validate_limit, validate_query};
