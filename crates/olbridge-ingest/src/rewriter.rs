//! Rewriting of relationship identifier slots.

use olbridge_core::{LineageEntityRef, RelationshipAttribute, Relationships};

use crate::ledger::PlaceholderLedger;
use crate::resolver::{AssetResolver, ResolutionScope};

/// Counts produced by one rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    /// Slots filled with a resolved id.
    pub rewritten: usize,
    /// Relationships without a qualified name, left as received.
    pub untouched: usize,
    /// Relationships whose lookup failed, left as received.
    pub failed: usize,
}

impl std::ops::AddAssign for RewriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.rewritten += other.rewritten;
        self.untouched += other.untouched;
        self.failed += other.failed;
    }
}

/// Fills relationship `guid` slots from the run's ledger.
///
/// Relationship targets carry no type of their own, so unknown targets are
/// minted with the resolver's placeholder type.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipRewriter<'a> {
    resolver: AssetResolver<'a>,
}

impl<'a> RelationshipRewriter<'a> {
    /// Creates a rewriter resolving through `resolver`.
    #[must_use]
    pub fn new(resolver: AssetResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Rewrites every relationship that references another entity by
    /// qualified name.
    pub async fn rewrite(
        &self,
        relationships: &mut Relationships,
        ledger: &mut PlaceholderLedger,
        scope: &mut ResolutionScope,
    ) -> RewriteSummary {
        let mut summary = RewriteSummary::default();

        for (name, attribute) in relationships.iter_mut() {
            let RelationshipAttribute::Reference(edge) = attribute else {
                summary.untouched += 1;
                continue;
            };

            let target =
                LineageEntityRef::new(&edge.qualified_name, self.resolver.placeholder_type());
            match ledger.get_or_create(&target, &self.resolver, scope).await {
                Ok(resolved) => {
                    tracing::debug!(
                        relationship = %name,
                        qualified_name = %edge.qualified_name,
                        id = %resolved.id,
                        "rewrote relationship"
                    );
                    edge.set_guid(resolved.id);
                    summary.rewritten += 1;
                }
                Err(e) => {
                    tracing::error!(
                        relationship = %name,
                        qualified_name = %edge.qualified_name,
                        error = %e,
                        "failed to resolve relationship target"
                    );
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use olbridge_core::{
        CatalogEntity, EntityId, GENERIC_ENTITY_TYPE, MemoryCatalog, RelationshipRef,
    };
    use olbridge_test_utils::RecordingCatalog;
    use serde_json::{Value, json};

    fn relationships(value: Value) -> Relationships {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn fills_slots_and_leaves_other_shapes() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(EntityId::new(7), "jobs/42", "databricks_job"))
            .unwrap();
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let rewriter = RelationshipRewriter::new(resolver);
        let mut ledger = PlaceholderLedger::new();
        let mut scope = ResolutionScope::new();

        let mut rels = relationships(json!({
            "job": {"qualifiedName": "jobs/42", "guid": "stale"},
            "notebook": {"qualifiedName": "notebooks/Ingest"},
            "cluster": null,
            "tags": [1, 2]
        }));
        let summary = rewriter.rewrite(&mut rels, &mut ledger, &mut scope).await;

        assert_eq!(
            summary,
            RewriteSummary {
                rewritten: 2,
                untouched: 2,
                failed: 0
            }
        );
        let value = serde_json::to_value(&rels).unwrap();
        assert_eq!(value["job"]["guid"], 7);
        assert_eq!(value["notebook"]["guid"], -1000);
        assert_eq!(value["notebook"]["qualifiedName"], "notebooks/Ingest");
        assert_eq!(value["cluster"], Value::Null);
        assert_eq!(value["tags"], json!([1, 2]));
        assert_eq!(
            ledger.get("notebooks/Ingest").unwrap().type_name,
            GENERIC_ENTITY_TYPE
        );
    }

    #[tokio::test]
    async fn failed_lookup_leaves_slot_untouched() {
        let catalog = RecordingCatalog::new();
        catalog.fail_queries_for("jobs/broken");
        let resolver = AssetResolver::new(&catalog, GENERIC_ENTITY_TYPE);
        let rewriter = RelationshipRewriter::new(resolver);
        let mut ledger = PlaceholderLedger::new();
        let mut scope = ResolutionScope::new();

        let mut edge = RelationshipRef::new("jobs/broken");
        edge.guid = Some(json!("original"));
        let mut rels = Relationships::new();
        rels.insert("job".into(), RelationshipAttribute::Reference(edge.clone()));

        let summary = rewriter.rewrite(&mut rels, &mut ledger, &mut scope).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(rels["job"], RelationshipAttribute::Reference(edge));
        assert!(ledger.is_empty());
    }
}
