//! # olbridge-ingest
//!
//! Reconciliation engine that turns lineage events into catalog writes.
//!
//! For every event the [`IngestionCoordinator`]:
//!
//! 1. Suppresses redeliveries through the [`EventDeduplicator`]
//! 2. Classifies each entity as a process, a plain asset, or skipped
//! 3. Resolves every referenced asset against the catalog, minting negative
//!    placeholder ids for assets the catalog does not know yet
//! 4. Rewrites dataset references, relationship slots and column mappings to
//!    the resolved identities
//! 5. Submits the placeholder batch and the main batch
//! 6. Deletes the placeholders touched by the run
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use olbridge_core::{IngestConfig, MemoryCatalog};
//! use olbridge_ingest::{IngestOutcome, IngestionCoordinator};
//!
//! # tokio_test_block(async {
//! let catalog = Arc::new(MemoryCatalog::new());
//! let coordinator = IngestionCoordinator::new(catalog.clone(), &IngestConfig::default());
//!
//! let outcome = coordinator.ingest(r#"{"entities": []}"#).await;
//! assert!(matches!(outcome, IngestOutcome::NothingToLoad(_)));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod batch;
pub mod column_mapping;
pub mod coordinator;
pub mod dedup;
pub mod error;
pub mod event;
pub mod ledger;
pub mod metrics;
pub mod resolver;
pub mod rewriter;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::column_mapping::{ColumnMappingProvider, TranslatedColumnMapping};
    pub use crate::coordinator::{IngestOutcome, IngestionCoordinator, RunSummary};
    pub use crate::dedup::{DedupStore, EventDeduplicator, MemoryDedupStore};
    pub use crate::error::{IngestError, Result};
    pub use crate::event::LineageEvent;
}

// Re-export key types at crate root for ergonomics
pub use batch::{BatchAccumulator, BatchKind, submit_batch};
pub use column_mapping::{ColumnMappingProvider, TranslatedColumnMapping};
pub use coordinator::{IngestOutcome, IngestionCoordinator, RunContext, RunSummary};
pub use dedup::{DedupKey, DedupStore, EventDeduplicator, MemoryDedupStore};
pub use error::{IngestError, Result};
pub use event::LineageEvent;
pub use ledger::PlaceholderLedger;
pub use resolver::{AssetResolver, QualifiedNameTranslations, ResolutionScope};
pub use rewriter::{RelationshipRewriter, RewriteSummary};
