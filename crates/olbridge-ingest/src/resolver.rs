//! Resolution of entity references to catalog identities.

use std::collections::BTreeMap;

use tracing::Instrument;

use olbridge_core::observability::catalog_span;
use olbridge_core::{CatalogClient, LineageEntityRef, PlaceholderIdAllocator, ResolvedEntity};

use crate::error::{IngestError, Result};
use crate::metrics::{record_placeholder_minted, record_resolution_failure};

/// Run-scoped map from the qualified name an event used to the qualified
/// name the catalog (or the placeholder) ended up with.
///
/// Column-mapping providers read it to point column lineage at the assets
/// that were actually resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualifiedNameTranslations(BTreeMap<String, String>);

impl QualifiedNameTranslations {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a translation, replacing any earlier one for `original`.
    pub fn record(&mut self, original: impl Into<String>, resolved: impl Into<String>) {
        self.0.insert(original.into(), resolved.into());
    }

    /// Returns the resolved name recorded for `original`.
    #[must_use]
    pub fn get(&self, original: &str) -> Option<&str> {
        self.0.get(original).map(String::as_str)
    }

    /// Returns the resolved name for `original`, or `original` when unknown.
    #[must_use]
    pub fn translate<'a>(&'a self, original: &'a str) -> &'a str {
        self.get(original).unwrap_or(original)
    }

    /// Iterates over `(original, resolved)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of recorded translations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Mutable resolution state of one run.
#[derive(Debug, Default)]
pub struct ResolutionScope {
    /// Source of placeholder identifiers.
    pub allocator: PlaceholderIdAllocator,
    /// Original to resolved qualified names.
    pub translations: QualifiedNameTranslations,
}

impl ResolutionScope {
    /// Creates a fresh scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolves one entity reference against the catalog.
#[derive(Clone, Copy)]
pub struct AssetResolver<'a> {
    catalog: &'a dyn CatalogClient,
    placeholder_type: &'a str,
}

impl std::fmt::Debug for AssetResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("catalog", &"CatalogClient")
            .field("placeholder_type", &self.placeholder_type)
            .finish()
    }
}

impl<'a> AssetResolver<'a> {
    /// Creates a resolver that mints placeholders of `placeholder_type`.
    #[must_use]
    pub fn new(catalog: &'a dyn CatalogClient, placeholder_type: &'a str) -> Self {
        Self {
            catalog,
            placeholder_type,
        }
    }

    /// Type given to placeholders.
    #[must_use]
    pub fn placeholder_type(&self) -> &'a str {
        self.placeholder_type
    }

    /// Resolves `reference`.
    ///
    /// When the catalog holds the asset, the result carries the catalog's id,
    /// qualified name and type. Otherwise a placeholder is minted from the
    /// scope's allocator. Either way the translation
    /// `reference.qualified_name -> resolved.qualified_name` is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Resolution`] if the catalog lookup fails. Nothing
    /// is minted or recorded in that case.
    pub async fn resolve(
        &self,
        reference: &LineageEntityRef,
        scope: &mut ResolutionScope,
    ) -> Result<ResolvedEntity> {
        let found = self
            .catalog
            .query_by_qualified_name(&reference.qualified_name)
            .instrument(catalog_span("query", &reference.qualified_name))
            .await
            .map_err(|source| {
                record_resolution_failure();
                IngestError::Resolution {
                    qualified_name: reference.qualified_name.clone(),
                    source,
                }
            })?;

        let resolved = match found {
            Some(entity) => {
                tracing::debug!(
                    qualified_name = %reference.qualified_name,
                    id = %entity.id,
                    catalog_qualified_name = %entity.qualified_name,
                    catalog_type = %entity.type_name,
                    "found entity in catalog"
                );
                ResolvedEntity::existing(&entity, reference)
            }
            None => {
                let id = scope.allocator.allocate();
                record_placeholder_minted();
                tracing::info!(
                    qualified_name = %reference.qualified_name,
                    type_name = %reference.type_name,
                    id = %id,
                    "entity not found in catalog; creating placeholder"
                );
                ResolvedEntity::placeholder(id, reference, self.placeholder_type)
            }
        };

        scope
            .translations
            .record(&reference.qualified_name, &resolved.qualified_name);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olbridge_core::{CatalogEntity, EntityId, GENERIC_ENTITY_TYPE, MemoryCatalog};

    fn catalog_with_table_b() -> MemoryCatalog {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(
                EntityId::new(42),
                "Warehouse/db/tableB",
                "azure_sql_table",
            ))
            .unwrap();
        catalog
    }

    #[tokio::test]
    async fn known_asset_resolves_to_catalog_identity() {
        let catalog = catalog_with_table_b();
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let mut scope = ResolutionScope::new();

        let reference = LineageEntityRef::new("warehouse/db/tableB", "azure_datalake_gen2_path");
        let resolved = resolver.resolve(&reference, &mut scope).await.unwrap();

        assert_eq!(resolved.id, EntityId::new(42));
        assert!(!resolved.is_placeholder);
        assert_eq!(resolved.qualified_name, "Warehouse/db/tableB");
        assert_eq!(resolved.type_name, "azure_sql_table");
        assert_eq!(resolved.original_type_name, "azure_datalake_gen2_path");
        assert_eq!(
            scope.translations.get("warehouse/db/tableB"),
            Some("Warehouse/db/tableB")
        );
        assert_eq!(scope.allocator.minted(), 0);
    }

    #[tokio::test]
    async fn unknown_asset_gets_placeholder() {
        let catalog = MemoryCatalog::new();
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let mut scope = ResolutionScope::new();

        let first = resolver
            .resolve(&LineageEntityRef::new("warehouse/db/TableA", "t"), &mut scope)
            .await
            .unwrap();
        let second = resolver
            .resolve(&LineageEntityRef::new("warehouse/db/TableC", "t"), &mut scope)
            .await
            .unwrap();

        assert!(first.is_placeholder);
        assert_eq!(first.id, EntityId::new(-1000));
        assert_eq!(second.id, EntityId::new(-1001));
        assert_eq!(first.type_name, GENERIC_ENTITY_TYPE);
        assert_eq!(first.qualified_name, "warehouse/db/tablea");
        assert_eq!(scope.translations.translate("warehouse/db/TableA"), "warehouse/db/tablea");
        assert_eq!(scope.translations.translate("unseen"), "unseen");
    }
}
