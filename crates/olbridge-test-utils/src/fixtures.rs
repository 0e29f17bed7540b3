//! Pre-built lineage events for common test scenarios.

use serde_json::{Value, json};

use olbridge_core::{CatalogEntity, EntityId};

/// Input of the reference scenario, unknown to the catalog.
pub const TABLE_A: &str = "warehouse/db/tableA";

/// Output of the reference scenario, known to the catalog.
pub const TABLE_B: &str = "warehouse/db/tableB";

/// Catalog id of [`TABLE_B`].
pub const TABLE_B_ID: i64 = 42;

/// Qualified name of the reference scenario's process.
pub const PROCESS_QN: &str = "databricks://workspace/jobs/42/tasks/ingest";

/// Factory for lineage event documents.
pub struct EventFactory;

impl EventFactory {
    /// Wraps entity documents into an event payload.
    #[must_use]
    pub fn payload(entities: Vec<Value>) -> String {
        json!({ "entities": entities }).to_string()
    }

    /// A dataset reference as found in process inputs and outputs.
    #[must_use]
    pub fn dataset(qualified_name: &str, type_name: &str) -> Value {
        json!({
            "typeName": type_name,
            "uniqueAttributes": { "qualifiedName": qualified_name }
        })
    }

    /// A process reading `inputs` and writing `outputs`, given as
    /// `(qualified_name, type_name)` pairs.
    ///
    /// The column mapping maps the first input to the first output.
    #[must_use]
    pub fn process(qualified_name: &str, inputs: &[(&str, &str)], outputs: &[(&str, &str)]) -> Value {
        let mapping = match (inputs.first(), outputs.first()) {
            (Some((source, _)), Some((sink, _))) => json!([{
                "DatasetMapping": { "Source": source, "Sink": sink },
                "ColumnMapping": [{ "Source": "id", "Sink": "id" }]
            }]),
            _ => json!([]),
        };
        json!({
            "typeName": "databricks_process",
            "guid": -1,
            "attributes": {
                "qualifiedName": qualified_name,
                "name": "ingest",
                "inputs": inputs.iter().map(|(qn, t)| Self::dataset(qn, t)).collect::<Vec<_>>(),
                "outputs": outputs.iter().map(|(qn, t)| Self::dataset(qn, t)).collect::<Vec<_>>(),
                "columnMapping": mapping.to_string()
            }
        })
    }

    /// Adds a relationship to `entity` pointing at `target_qualified_name`.
    #[must_use]
    pub fn with_relationship(mut entity: Value, name: &str, target_qualified_name: &str) -> Value {
        entity["relationshipAttributes"][name] = json!({ "qualifiedName": target_qualified_name });
        entity
    }

    /// A plain asset.
    #[must_use]
    pub fn asset(qualified_name: &str, type_name: &str) -> Value {
        json!({
            "typeName": type_name,
            "attributes": { "qualifiedName": qualified_name }
        })
    }

    /// The reference scenario: one process reading [`TABLE_A`] and writing
    /// [`TABLE_B`].
    #[must_use]
    pub fn reference_scenario() -> String {
        Self::payload(vec![Self::process(
            PROCESS_QN,
            &[(TABLE_A, "azure_datalake_gen2_path")],
            &[(TABLE_B, "azure_sql_table")],
        )])
    }

    /// The catalog entity behind [`TABLE_B`].
    #[must_use]
    pub fn table_b() -> CatalogEntity {
        CatalogEntity::new(EntityId::new(TABLE_B_ID), TABLE_B, "azure_sql_table")
    }
}
