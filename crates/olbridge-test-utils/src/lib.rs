//! Shared test utilities for olbridge integration tests.
//!
//! This crate provides:
//! - [`RecordingCatalog`]: In-memory catalog with call recording and failure injection
//! - [`EventFactory`]: Lineage event fixtures, including the reference scenario
//! - Assertion helpers over recorded catalog calls
//!
//! # Example
//!
//! ```rust,ignore
//! use olbridge_test_utils::{EventFactory, RecordingCatalog, assert_upsert_count};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let catalog = RecordingCatalog::with_entities([EventFactory::table_b()]);
//!     // ... ingest EventFactory::reference_scenario() ...
//!     assert_upsert_count(&catalog, 2);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod assertions;
pub mod catalog;
pub mod fixtures;

pub use assertions::*;
pub use catalog::*;
pub use fixtures::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("olbridge=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
