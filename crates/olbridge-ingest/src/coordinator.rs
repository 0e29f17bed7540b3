//! Per-event orchestration.
//!
//! ## State machine
//!
//! ```text
//! Received -> Deduped? -> AlreadyRegistered
//!          -> Resolving -> Rewriting -> Accumulating -> Submitting -> CleaningUp -> Done
//! ```
//!
//! There is no retry loop. Catalog failures are logged and the run continues
//! with the state it has, so a failed upsert never prevents cleanup. Nothing
//! crosses the event boundary as an error: every path ends in an
//! [`IngestOutcome`].

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::Instrument;

use olbridge_core::observability::ingest_span;
use olbridge_core::{
    AssetEntity, CatalogClient, DatasetRef, EventEntity, IngestConfig, ProcessEntity,
};

use crate::batch::{BatchAccumulator, BatchKind, submit_batch};
use crate::column_mapping::{ColumnMappingProvider, TranslatedColumnMapping};
use crate::dedup::{DedupKey, EventDeduplicator};
use crate::event::LineageEvent;
use crate::ledger::PlaceholderLedger;
use crate::metrics::{record_cleanup_delete, record_event};
use crate::resolver::{AssetResolver, ResolutionScope};
use crate::rewriter::{RelationshipRewriter, RewriteSummary};

/// Counts describing one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Processes validated into the main batch.
    pub processes: usize,
    /// Plain assets accepted into the main batch.
    pub assets: usize,
    /// Elements filtered out at classification.
    pub skipped: usize,
    /// Processes and assets dropped because their own resolution failed.
    pub dropped: usize,
    /// Process inputs and outputs left as sent because their lookup failed.
    pub unresolved_datasets: usize,
    /// Relationship rewriting totals.
    pub relationships: RewriteSummary,
    /// Placeholder ids minted in the run.
    pub placeholders_minted: u64,
    /// Documents in the placeholder batch.
    pub placeholder_batch_size: usize,
    /// Documents in the main batch.
    pub main_batch_size: usize,
    /// Whether the catalog accepted the placeholder batch, if one was sent.
    pub placeholder_batch_accepted: Option<bool>,
    /// Whether the catalog accepted the main batch, if one was sent.
    pub main_batch_accepted: Option<bool>,
    /// Cleanup deletes that succeeded.
    pub cleanup_deleted: usize,
    /// Cleanup deletes that failed.
    pub cleanup_failed: usize,
}

/// Result of handing one event to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The main batch was submitted and cleanup ran.
    ///
    /// The catalog may still have rejected a batch; see the summary.
    Submitted(RunSummary),
    /// The main batch was empty. Cleanup ran and the run counts as failed.
    NothingToLoad(RunSummary),
    /// The event was seen within the dedup TTL and was not processed.
    AlreadyRegistered,
    /// The event was rejected before any catalog call.
    NotSent {
        /// Why the event was rejected.
        reason: String,
    },
}

impl IngestOutcome {
    /// Returns true for [`IngestOutcome::Submitted`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }

    /// Returns the run summary, if the event reached the resolution phase.
    #[must_use]
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Submitted(summary) | Self::NothingToLoad(summary) => Some(summary),
            Self::AlreadyRegistered | Self::NotSent { .. } => None,
        }
    }

    /// Returns the label used in logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submitted(_) => "submitted",
            Self::NothingToLoad(_) => "nothing_to_load",
            Self::AlreadyRegistered => "already_registered",
            Self::NotSent { .. } => "not_sent",
        }
    }
}

impl fmt::Display for IngestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted(summary) => write!(
                f,
                "submitted {} entities and {} placeholders to the catalog",
                summary.main_batch_size, summary.placeholder_batch_size
            ),
            Self::NothingToLoad(_) => write!(f, "no entity to load"),
            Self::AlreadyRegistered => write!(f, "payload already registered in the catalog"),
            Self::NotSent { reason } => write!(f, "not sent: {reason}"),
        }
    }
}

/// State owned by a single run.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Allocator and translation table.
    pub scope: ResolutionScope,
    /// Entities resolved through the ledger.
    pub ledger: PlaceholderLedger,
    /// Outgoing documents.
    pub batches: BatchAccumulator,
    /// Running counts.
    pub summary: RunSummary,
}

impl RunContext {
    /// Creates the state of a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Reconciles lineage events against the catalog.
///
/// A coordinator is shared across concurrent events. Each call allocates its
/// own [`RunContext`]; only the dedup store is shared between calls.
#[derive(Clone)]
pub struct IngestionCoordinator {
    catalog: Arc<dyn CatalogClient>,
    dedup: EventDeduplicator,
    column_mapping: Arc<dyn ColumnMappingProvider>,
    placeholder_type: String,
}

impl fmt::Debug for IngestionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionCoordinator")
            .field("catalog", &"CatalogClient")
            .field("dedup", &self.dedup)
            .field("column_mapping", &"ColumnMappingProvider")
            .field("placeholder_type", &self.placeholder_type)
            .finish()
    }
}

impl IngestionCoordinator {
    /// Creates a coordinator with an in-memory dedup store and the
    /// translating column-mapping provider.
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogClient>, config: &IngestConfig) -> Self {
        Self {
            catalog,
            dedup: EventDeduplicator::in_memory(config.dedup_ttl()),
            column_mapping: Arc::new(TranslatedColumnMapping),
            placeholder_type: config.placeholder_type_name.clone(),
        }
    }

    /// Replaces the deduplicator.
    #[must_use]
    pub fn with_deduplicator(mut self, dedup: EventDeduplicator) -> Self {
        self.dedup = dedup;
        self
    }

    /// Replaces the column-mapping provider.
    #[must_use]
    pub fn with_column_mapping(mut self, provider: Arc<dyn ColumnMappingProvider>) -> Self {
        self.column_mapping = provider;
        self
    }

    /// Type given to placeholders and used for cleanup deletes.
    #[must_use]
    pub fn placeholder_type(&self) -> &str {
        &self.placeholder_type
    }

    /// Ingests a raw event payload.
    pub async fn ingest(&self, payload: &str) -> IngestOutcome {
        match LineageEvent::parse(payload) {
            Ok(event) => self.ingest_event(event).await,
            Err(e) => {
                tracing::error!(error = %e, "event not sent");
                let outcome = IngestOutcome::NotSent {
                    reason: e.to_string(),
                };
                record_event(outcome.label(), 0.0);
                outcome
            }
        }
    }

    /// Ingests an already-parsed event.
    pub async fn ingest_event(&self, event: LineageEvent) -> IngestOutcome {
        let started = Instant::now();
        let outcome = match event.dedup_key() {
            Ok(key) => {
                let span = ingest_span(key.as_str());
                self.run(event, &key).instrument(span).await
            }
            Err(e) => {
                tracing::error!(error = %e, "event not sent");
                IngestOutcome::NotSent {
                    reason: e.to_string(),
                }
            }
        };
        record_event(outcome.label(), started.elapsed().as_secs_f64());
        outcome
    }

    async fn run(&self, event: LineageEvent, key: &DedupKey) -> IngestOutcome {
        if !self.dedup.should_process(key).await {
            tracing::info!("payload already registered in the catalog");
            return IngestOutcome::AlreadyRegistered;
        }

        let mut ctx = RunContext::new();
        let resolver = AssetResolver::new(&*self.catalog, &self.placeholder_type);

        for entity in event.into_entities() {
            match entity {
                EventEntity::Process(process) => {
                    match self.validate_process(*process, &resolver, &mut ctx).await {
                        Some(document) => {
                            ctx.batches.add_entity(document);
                            ctx.summary.processes += 1;
                        }
                        None => ctx.summary.dropped += 1,
                    }
                }
                EventEntity::Asset(asset) => {
                    match self.validate_asset(*asset, &resolver, &mut ctx).await {
                        Some(document) => {
                            ctx.batches.add_entity(document);
                            ctx.summary.assets += 1;
                        }
                        None => ctx.summary.dropped += 1,
                    }
                }
                EventEntity::Skipped(reason) => {
                    tracing::debug!(reason = %reason, "skipping entity");
                    ctx.summary.skipped += 1;
                }
            }
        }

        self.submit_and_cleanup(ctx).await
    }

    /// Resolves a process, its datasets and relationships, and injects the
    /// column mapping. Returns the document for the main batch, or `None`
    /// when the process itself cannot be resolved.
    pub async fn validate_process(
        &self,
        mut process: ProcessEntity,
        resolver: &AssetResolver<'_>,
        ctx: &mut RunContext,
    ) -> Option<Value> {
        let reference = process.to_lineage_ref();
        let resolved = match resolver.resolve(&reference, &mut ctx.scope).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(qualified_name = %reference.qualified_name, error = %e, "dropping process");
                return None;
            }
        };
        tracing::info!(
            qualified_name = %reference.qualified_name,
            type_name = %resolved.type_name,
            original_type_name = %resolved.original_type_name,
            id = %resolved.id,
            "resolved process"
        );
        process.set_guid(resolved.id);
        if !resolved.is_placeholder {
            process.attributes.qualified_name = resolved.qualified_name;
        }

        let attributes = &mut process.attributes;
        for dataset in attributes
            .inputs
            .iter_mut()
            .chain(attributes.outputs.iter_mut())
        {
            self.resolve_dataset(dataset, resolver, ctx).await;
        }

        ctx.summary.relationships += RelationshipRewriter::new(*resolver)
            .rewrite(
                &mut process.relationship_attributes,
                &mut ctx.ledger,
                &mut ctx.scope,
            )
            .await;

        match self
            .column_mapping
            .column_mapping(&process, &ctx.scope.translations)
        {
            Ok(mapping) => process.attributes.column_mapping = mapping,
            Err(e) => tracing::warn!(
                qualified_name = %process.attributes.qualified_name,
                error = %e,
                "keeping column mapping as sent"
            ),
        }

        match serde_json::to_value(&process) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize process");
                None
            }
        }
    }

    /// Points a process input or output at its resolved entity and queues
    /// the placeholder, if any. Returns false when the lookup failed and the
    /// reference was left as sent.
    pub async fn resolve_dataset(
        &self,
        dataset: &mut DatasetRef,
        resolver: &AssetResolver<'_>,
        ctx: &mut RunContext,
    ) -> bool {
        let reference = dataset.to_lineage_ref();
        match ctx
            .ledger
            .get_or_create(&reference, resolver, &mut ctx.scope)
            .await
        {
            Ok(resolved) => {
                dataset.apply(&resolved);
                ctx.batches.add_placeholder(&resolved);
                true
            }
            Err(e) => {
                tracing::error!(
                    qualified_name = %reference.qualified_name,
                    error = %e,
                    "failed to resolve dataset; keeping reference as sent"
                );
                ctx.summary.unresolved_datasets += 1;
                false
            }
        }
    }

    /// Resolves a plain asset and its relationships. Returns the document
    /// for the main batch, or `None` when the asset cannot be resolved.
    pub async fn validate_asset(
        &self,
        mut asset: AssetEntity,
        resolver: &AssetResolver<'_>,
        ctx: &mut RunContext,
    ) -> Option<Value> {
        let reference = asset.to_lineage_ref();
        let resolved = match ctx
            .ledger
            .get_or_create(&reference, resolver, &mut ctx.scope)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(qualified_name = %reference.qualified_name, error = %e, "dropping asset");
                return None;
            }
        };

        ctx.summary.relationships += RelationshipRewriter::new(*resolver)
            .rewrite(
                &mut asset.relationship_attributes,
                &mut ctx.ledger,
                &mut ctx.scope,
            )
            .await;
        asset.set_guid(resolved.id);

        match serde_json::to_value(&asset) {
            Ok(document) => Some(document),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize asset");
                None
            }
        }
    }

    /// Submits both batches, then deletes every ledger entry.
    pub async fn submit_and_cleanup(&self, ctx: RunContext) -> IngestOutcome {
        let RunContext {
            scope,
            ledger,
            batches,
            mut summary,
        } = ctx;
        summary.placeholders_minted = scope.allocator.minted();
        summary.placeholder_batch_size = batches.placeholder_count();
        summary.main_batch_size = batches.main_count();

        if let Some(batch) = batches.placeholder_batch() {
            tracing::info!(size = batch.len(), "loading input and output placeholders");
            summary.placeholder_batch_accepted =
                Some(submit_batch(&*self.catalog, BatchKind::Placeholder, &batch).await);
        }

        let main = batches.main_batch();
        match &main {
            Some(batch) => {
                summary.main_batch_accepted =
                    Some(submit_batch(&*self.catalog, BatchKind::Main, batch).await);
            }
            None => tracing::error!("no entity to load"),
        }

        let (deleted, failed) = self.cleanup(&ledger).await;
        summary.cleanup_deleted = deleted;
        summary.cleanup_failed = failed;

        if main.is_some() {
            IngestOutcome::Submitted(summary)
        } else {
            IngestOutcome::NothingToLoad(summary)
        }
    }

    /// Deletes every ledger entry by its resolved qualified name and the
    /// placeholder type. Returns `(deleted, failed)`.
    pub async fn cleanup(&self, ledger: &PlaceholderLedger) -> (usize, usize) {
        let mut deleted = 0;
        let mut failed = 0;
        for (_, resolved) in ledger.entries() {
            match self
                .catalog
                .delete_entity(&resolved.qualified_name, &self.placeholder_type)
                .await
            {
                Ok(()) => {
                    tracing::debug!(qualified_name = %resolved.qualified_name, "deleted placeholder");
                    record_cleanup_delete(true);
                    deleted += 1;
                }
                Err(e) => {
                    tracing::error!(
                        qualified_name = %resolved.qualified_name,
                        error = %e,
                        "failed to delete placeholder"
                    );
                    record_cleanup_delete(false);
                    failed += 1;
                }
            }
        }
        tracing::info!(deleted, failed, "cleanup finished");
        (deleted, failed)
    }
}
