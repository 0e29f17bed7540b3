//! # olbridge-core
//!
//! Core abstractions for olbridge, the bridge that reconciles lineage events
//! against a remote metadata catalog.
//!
//! This crate provides the foundational types and traits used by the
//! ingestion engine and its adapters:
//!
//! - **Entity Model**: Typed process, asset and relationship shapes parsed once
//!   at the event boundary
//! - **Identifiers**: Catalog ids and the run-scoped placeholder id allocator
//! - **Catalog Contract**: The [`CatalogClient`] trait and an in-memory catalog
//! - **Configuration**: Environment-driven ingestion settings
//! - **Observability**: Logging initialization and span helpers
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Example
//!
//! ```rust
//! use olbridge_core::prelude::*;
//!
//! let mut allocator = PlaceholderIdAllocator::new();
//! let reference = LineageEntityRef::new("warehouse/db/tableA", "azure_datalake_gen2_path");
//! let placeholder = ResolvedEntity::placeholder(allocator.allocate(), &reference, GENERIC_ENTITY_TYPE);
//!
//! assert!(placeholder.is_placeholder);
//! assert_eq!(placeholder.qualified_name, "warehouse/db/tablea");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod catalog;
pub mod config;
pub mod entity;
pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::catalog::{CatalogClient, CatalogEntity, EntityBatch, MemoryCatalog, UpsertResponse};
    pub use crate::config::{GENERIC_ENTITY_TYPE, IngestConfig};
    pub use crate::entity::{
        AssetEntity, DatasetRef, EventEntity, LineageEntityRef, ProcessEntity,
        RelationshipAttribute, RelationshipRef, ResolvedEntity, SkipReason,
    };
    pub use crate::error::{Error, Result};
    pub use crate::id::{EntityId, PLACEHOLDER_ID_START, PlaceholderIdAllocator};
}

// Re-export key types at crate root for ergonomics
pub use catalog::{CatalogClient, CatalogEntity, DeleteRecord, EntityBatch, MemoryCatalog, UpsertResponse};
pub use config::{GENERIC_ENTITY_TYPE, IngestConfig};
pub use entity::{
    AssetEntity, DatasetRef, EventEntity, LineageEntityRef, ProcessEntity, RelationshipAttribute,
    RelationshipRef, Relationships, ResolvedEntity, SkipReason,
};
pub use error::{Error, Result};
pub use id::{EntityId, PLACEHOLDER_ID_START, PlaceholderIdAllocator};
pub use observability::{LogFormat, init_logging};
