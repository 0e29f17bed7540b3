//! Accumulation and submission of entity batches.
//!
//! A run produces two independent batches:
//!
//! - the placeholder batch: placeholders minted for process inputs and
//!   outputs, one document per id, qualified names lower-cased
//! - the main batch: validated processes and accepted assets, in event order
//!
//! Each non-empty batch is submitted once as `{"entities": [...]}`.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;
use tracing::Instrument;

use olbridge_core::{CatalogClient, EntityBatch, EntityId, ResolvedEntity};

use crate::metrics::record_batch_submitted;

/// Which of the two batches a submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    /// Placeholders for process inputs and outputs.
    Placeholder,
    /// Processes and plain assets.
    Main,
}

impl BatchKind {
    /// Returns the label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placeholder => "placeholder",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collects the documents of one run.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    placeholders: Vec<Value>,
    placeholder_ids: HashSet<EntityId>,
    main: Vec<Value>,
}

impl BatchAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a placeholder to the placeholder batch.
    ///
    /// Catalog entities and ids already added are ignored. Returns true if
    /// the document was added.
    pub fn add_placeholder(&mut self, resolved: &ResolvedEntity) -> bool {
        if !resolved.is_placeholder || !self.placeholder_ids.insert(resolved.id) {
            return false;
        }
        self.placeholders.push(resolved.to_batch_document());
        true
    }

    /// Appends a document to the main batch.
    pub fn add_entity(&mut self, document: Value) {
        self.main.push(document);
    }

    /// Number of placeholder documents.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Number of main documents.
    #[must_use]
    pub fn main_count(&self) -> usize {
        self.main.len()
    }

    /// Returns the placeholder batch, or `None` when it is empty.
    #[must_use]
    pub fn placeholder_batch(&self) -> Option<EntityBatch> {
        (!self.placeholders.is_empty()).then(|| EntityBatch::new(self.placeholders.clone()))
    }

    /// Returns the main batch, or `None` when it is empty.
    #[must_use]
    pub fn main_batch(&self) -> Option<EntityBatch> {
        (!self.main.is_empty()).then(|| EntityBatch::new(self.main.clone()))
    }
}

/// Submits one batch and reports whether the catalog accepted it.
///
/// Rejections and transport failures are logged at error level and never
/// propagate.
pub async fn submit_batch(catalog: &dyn CatalogClient, kind: BatchKind, batch: &EntityBatch) -> bool {
    let span = tracing::debug_span!("submit_batch", kind = %kind, size = batch.len());
    let accepted = match catalog.upsert_batch(batch).instrument(span).await {
        Ok(response) if response.is_ok() => {
            tracing::info!(kind = %kind, size = batch.len(), "batch submitted");
            true
        }
        Ok(response) => {
            tracing::error!(
                kind = %kind,
                size = batch.len(),
                status = response.status,
                reason = %response.reason_phrase,
                body = %response.body,
                "catalog rejected batch"
            );
            false
        }
        Err(e) => {
            tracing::error!(kind = %kind, size = batch.len(), error = %e, "failed to submit batch");
            false
        }
    };
    record_batch_submitted(kind.as_str(), accepted, batch.len());
    accepted
}
