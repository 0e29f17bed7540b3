//! Run-scoped registry of resolved entities.
//!
//! Every asset reference that passes through the ledger (process inputs and
//! outputs, relationship targets, plain assets) is resolved at most once per
//! qualified name. Later references reuse the stored [`ResolvedEntity`],
//! including any placeholder id minted for it, without touching the catalog.

use std::collections::HashMap;

use olbridge_core::{LineageEntityRef, ResolvedEntity};

use crate::error::Result;
use crate::resolver::{AssetResolver, ResolutionScope};

/// Registry of resolved entities, keyed by the qualified name the event used.
#[derive(Debug, Default)]
pub struct PlaceholderLedger {
    entries: Vec<(String, ResolvedEntity)>,
    index: HashMap<String, usize>,
}

impl PlaceholderLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `reference`, resolving it on first sight.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error on a failed lookup. Failures are not
    /// recorded, so a later reference to the same name tries again.
    pub async fn get_or_create(
        &mut self,
        reference: &LineageEntityRef,
        resolver: &AssetResolver<'_>,
        scope: &mut ResolutionScope,
    ) -> Result<ResolvedEntity> {
        if let Some(existing) = self.get(&reference.qualified_name) {
            tracing::trace!(qualified_name = %reference.qualified_name, id = %existing.id, "ledger hit");
            return Ok(existing.clone());
        }

        let resolved = resolver.resolve(reference, scope).await?;
        self.index
            .insert(reference.qualified_name.clone(), self.entries.len());
        self.entries
            .push((reference.qualified_name.clone(), resolved.clone()));
        Ok(resolved)
    }

    /// Returns the entry recorded for `qualified_name`.
    #[must_use]
    pub fn get(&self, qualified_name: &str) -> Option<&ResolvedEntity> {
        self.index
            .get(qualified_name)
            .map(|&position| &self.entries[position].1)
    }

    /// Iterates over `(event qualified name, resolved entity)` in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &ResolvedEntity)> {
        self.entries
            .iter()
            .map(|(name, resolved)| (name.as_str(), resolved))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was resolved through the ledger.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olbridge_core::{CatalogEntity, EntityId, GENERIC_ENTITY_TYPE, MemoryCatalog};
    use olbridge_test_utils::RecordingCatalog;

    #[tokio::test]
    async fn repeated_reference_reuses_entry_without_requery() {
        let catalog = RecordingCatalog::new();
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let mut scope = ResolutionScope::new();
        let mut ledger = PlaceholderLedger::new();

        let input = LineageEntityRef::new("warehouse/db/tableA", "azure_datalake_gen2_path");
        let target = LineageEntityRef::new("warehouse/db/tableA", GENERIC_ENTITY_TYPE);

        let first = ledger.get_or_create(&input, &resolver, &mut scope).await.unwrap();
        let second = ledger.get_or_create(&target, &resolver, &mut scope).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.id, EntityId::new(-1000));
        assert_eq!(ledger.len(), 1);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn failed_resolution_is_not_recorded() {
        let catalog = RecordingCatalog::new();
        catalog.fail_queries_for("warehouse/db/flaky");
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let mut scope = ResolutionScope::new();
        let mut ledger = PlaceholderLedger::new();

        let reference = LineageEntityRef::new("warehouse/db/flaky", "t");
        assert!(ledger.get_or_create(&reference, &resolver, &mut scope).await.is_err());
        assert!(ledger.is_empty());
        assert!(scope.translations.is_empty());
        assert_eq!(scope.allocator.minted(), 0);
    }

    #[tokio::test]
    async fn entries_keep_insertion_order_and_flag_placeholders() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(EntityId::new(42), "warehouse/db/tableB", "azure_sql_table"))
            .unwrap();
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let mut scope = ResolutionScope::new();
        let mut ledger = PlaceholderLedger::new();

        for name in ["warehouse/db/tableA", "warehouse/db/tableB", "warehouse/db/tableC"] {
            ledger
                .get_or_create(&LineageEntityRef::new(name, "t"), &resolver, &mut scope)
                .await
                .unwrap();
        }

        let ids: Vec<i64> = ledger
            .entries()
            .filter(|(_, entry)| entry.is_placeholder)
            .map(|(_, entry)| entry.id.get())
            .collect();
        assert_eq!(ids, vec![-1000, -1001]);
        let names: Vec<&str> = ledger.entries().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["warehouse/db/tableA", "warehouse/db/tableB", "warehouse/db/tableC"]
        );
    }
}
