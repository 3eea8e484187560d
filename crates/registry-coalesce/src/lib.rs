//! Singleflight coordinator (C7).
//!
//! Deduplicates concurrent in-flight fetches for the same cache key: the
//! first caller for a key runs the fetch (the "leader"); any caller that
//! arrives while it is in flight joins and receives the same result (a
//! "waiter") instead of starting a redundant fetch.
//!
//! # How It Works
//!
//! 1. The first call for a given key begins executing.
//! 2. Subsequent calls for the same key wait for it to complete.
//! 3. All waiting calls receive a clone of the result.
//! 4. Errors are propagated to every waiter too.
//!
//! # Example
//!
//! ```rust
//! use registry_coalesce::SingleflightCoordinator;
//!
//! # async fn example() {
//! let coordinator: SingleflightCoordinator<String, String> = SingleflightCoordinator::new();
//! let result = coordinator
//!     .do_once("details:5560001712", async { Ok::<_, String>("payload".to_string()) })
//!     .await;
//! assert_eq!(result.unwrap(), "payload");
//! # }
//! ```
//!
//! # Prior Art
//!
//! This pattern is also known as:
//! - **Singleflight** (Go's `golang.org/x/sync/singleflight`)
//! - **Request deduplication** / **request collapsing**

mod coordinator;

pub use coordinator::{CoalesceError, SingleflightCoordinator};
