//! Typed entity graph of a lineage event.
//!
//! Events arrive as loosely-typed JSON documents in catalog entity form. Each
//! element of the `entities` array is classified exactly once, at the
//! boundary, into an [`EventEntity`]:
//!
//! - [`ProcessEntity`]: carries `attributes.columnMapping` plus `inputs` and
//!   `outputs` dataset references.
//! - [`AssetEntity`]: carries `typeName` and a string `attributes.qualifiedName`.
//! - [`EventEntity::Skipped`]: anything else, with the reason it was dropped.
//!
//! Every struct keeps the fields it does not model in a flattened map so the
//! submitted document is the received document with only the reconciled
//! slots (`guid`, qualified names, type names, `columnMapping`) changed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::catalog::CatalogEntity;
use crate::id::EntityId;

/// Unmodelled JSON fields carried through untouched.
pub type Fields = Map<String, Value>;

/// Relationship attributes of an entity, keyed by relationship name.
pub type Relationships = BTreeMap<String, RelationshipAttribute>;

/// Returns the display name implied by a qualified name.
///
/// This is the last non-empty `/`-separated segment, so both
/// `warehouse/db/tableA` and `warehouse/db/tableA/` yield `tableA`.
#[must_use]
pub fn display_name_for(qualified_name: &str) -> String {
    qualified_name
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(qualified_name)
        .to_string()
}

// ============================================================================
// References and resolutions
// ============================================================================

/// A reference to a catalog asset that has not been resolved yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineageEntityRef {
    /// Qualified name as it appeared in the event.
    pub qualified_name: String,
    /// Type name as it appeared in the event.
    pub type_name: String,
    /// Human-readable name.
    pub display_name: String,
}

impl LineageEntityRef {
    /// Creates a reference whose display name is derived from the qualified name.
    #[must_use]
    pub fn new(qualified_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let qualified_name = qualified_name.into();
        let display_name = display_name_for(&qualified_name);
        Self {
            qualified_name,
            type_name: type_name.into(),
            display_name,
        }
    }

    /// Overrides the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

impl fmt::Display for LineageEntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.qualified_name, self.type_name)
    }
}

/// The catalog identity an entity reference resolved to.
///
/// `id` is positive when the catalog already knows the asset and negative
/// when a placeholder was minted for it in the current run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEntity {
    /// Catalog or placeholder identifier.
    pub id: EntityId,
    /// Qualified name in the catalog (lower-cased for placeholders).
    pub qualified_name: String,
    /// Type name in the catalog (the generic type for placeholders).
    pub type_name: String,
    /// Type name from the event reference.
    pub original_type_name: String,
    /// Whether the entity was fabricated locally.
    pub is_placeholder: bool,
    /// Entity document submitted to the catalog for placeholders.
    pub properties: Value,
}

impl ResolvedEntity {
    /// Builds a resolution for an asset the catalog already holds.
    #[must_use]
    pub fn existing(found: &CatalogEntity, reference: &LineageEntityRef) -> Self {
        let properties = entity_document(
            &found.type_name,
            found.id,
            &found.qualified_name,
            &reference.display_name,
        );
        Self {
            id: found.id,
            qualified_name: found.qualified_name.clone(),
            type_name: found.type_name.clone(),
            original_type_name: reference.type_name.clone(),
            is_placeholder: false,
            properties,
        }
    }

    /// Builds a placeholder for an asset the catalog does not hold.
    ///
    /// The qualified name is lower-cased so later events match it regardless
    /// of the casing the producer used.
    #[must_use]
    pub fn placeholder(id: EntityId, reference: &LineageEntityRef, placeholder_type: &str) -> Self {
        let qualified_name = reference.qualified_name.to_lowercase();
        let properties = entity_document(
            placeholder_type,
            id,
            &qualified_name,
            &reference.display_name,
        );
        Self {
            id,
            qualified_name,
            type_name: placeholder_type.to_string(),
            original_type_name: reference.type_name.clone(),
            is_placeholder: true,
            properties,
        }
    }

    /// Returns the document to submit for this entity, with a canonical
    /// lower-case qualified name for placeholders.
    #[must_use]
    pub fn to_batch_document(&self) -> Value {
        let mut document = self.properties.clone();
        if self.is_placeholder {
            if let Some(Value::String(name)) = document.pointer_mut("/attributes/qualifiedName") {
                *name = name.to_lowercase();
            }
        }
        document
    }
}

fn entity_document(type_name: &str, id: EntityId, qualified_name: &str, name: &str) -> Value {
    json!({
        "typeName": type_name,
        "guid": id,
        "attributes": {
            "qualifiedName": qualified_name,
            "name": name,
            "description": format!("Data Assets {name}"),
        },
    })
}

// ============================================================================
// Wire shapes
// ============================================================================

/// An input or output of a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    /// Dataset type name.
    pub type_name: String,
    /// Catalog identifier, set once the dataset resolved to a catalog entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    /// Unique attributes identifying the dataset.
    pub unique_attributes: UniqueAttributes,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

/// Unique attributes block of a [`DatasetRef`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueAttributes {
    /// Dataset qualified name.
    pub qualified_name: String,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl DatasetRef {
    /// Creates a dataset reference.
    #[must_use]
    pub fn new(qualified_name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            guid: None,
            unique_attributes: UniqueAttributes {
                qualified_name: qualified_name.into(),
                extra: Fields::new(),
            },
            extra: Fields::new(),
        }
    }

    /// Returns the unresolved reference this dataset points at.
    #[must_use]
    pub fn to_lineage_ref(&self) -> LineageEntityRef {
        LineageEntityRef::new(&self.unique_attributes.qualified_name, &self.type_name)
    }

    /// Points this reference at a resolved entity.
    ///
    /// The `guid` slot only carries catalog ids. Placeholders are created in
    /// a separate request, so their negative ids mean nothing to the batch
    /// that references them and the reference goes by unique attributes.
    pub fn apply(&mut self, resolved: &ResolvedEntity) {
        self.type_name.clone_from(&resolved.type_name);
        self.unique_attributes
            .qualified_name
            .clone_from(&resolved.qualified_name);
        self.guid = (!resolved.is_placeholder).then(|| resolved.id.into());
    }
}

/// A relationship attribute value.
///
/// Only objects carrying a string `qualifiedName` are rewritten; every other
/// shape (arrays, nulls, objects without a qualified name) passes through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipAttribute {
    /// A reference to another entity by qualified name.
    Reference(RelationshipRef),
    /// Any other relationship value.
    Other(Value),
}

/// A relationship edge whose identifier slot can be rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRef {
    /// Qualified name of the related entity.
    pub qualified_name: String,
    /// Identifier slot of the related entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl RelationshipRef {
    /// Creates a relationship edge with an empty identifier slot.
    #[must_use]
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            guid: None,
            extra: Fields::new(),
        }
    }

    /// Writes a resolved identifier into the slot.
    pub fn set_guid(&mut self, id: EntityId) {
        self.guid = Some(id.into());
    }
}

/// A data-processing job linking input datasets to output datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEntity {
    /// Process type name.
    pub type_name: String,
    /// Identifier slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    /// Process attributes.
    pub attributes: ProcessAttributes,
    /// Relationship attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationship_attributes: Relationships,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

/// Attributes block of a [`ProcessEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessAttributes {
    /// Process qualified name.
    pub qualified_name: String,
    /// Process display name. Kept as sent; only a string is used for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    /// Datasets read by the process.
    #[serde(default)]
    pub inputs: Vec<DatasetRef>,
    /// Datasets written by the process.
    #[serde(default)]
    pub outputs: Vec<DatasetRef>,
    /// Column-level lineage document (serialized JSON string on the wire).
    pub column_mapping: Value,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl ProcessEntity {
    /// Returns the unresolved reference to the process itself.
    #[must_use]
    pub fn to_lineage_ref(&self) -> LineageEntityRef {
        let reference = LineageEntityRef::new(&self.attributes.qualified_name, &self.type_name);
        match self.attributes.name.as_ref().and_then(Value::as_str) {
            Some(name) => reference.with_display_name(name),
            None => reference,
        }
    }

    /// Writes a resolved identifier into the `guid` slot.
    pub fn set_guid(&mut self, id: EntityId) {
        self.guid = Some(id.into());
    }
}

/// A plain data asset (table, file, folder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntity {
    /// Asset type name.
    pub type_name: String,
    /// Identifier slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<Value>,
    /// Asset attributes.
    pub attributes: AssetAttributes,
    /// Relationship attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relationship_attributes: Relationships,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

/// Attributes block of an [`AssetEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAttributes {
    /// Asset qualified name.
    pub qualified_name: String,
    /// Asset display name. Kept as sent; only a string is used for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Fields,
}

impl AssetEntity {
    /// Returns the unresolved reference to the asset.
    #[must_use]
    pub fn to_lineage_ref(&self) -> LineageEntityRef {
        let reference = LineageEntityRef::new(&self.attributes.qualified_name, &self.type_name);
        match self.attributes.name.as_ref().and_then(Value::as_str) {
            Some(name) => reference.with_display_name(name),
            None => reference,
        }
    }

    /// Writes a resolved identifier into the `guid` slot.
    pub fn set_guid(&mut self, id: EntityId) {
        self.guid = Some(id.into());
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Why an element of the `entities` array was not ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The element is not a JSON object.
    NotAnObject,
    /// `typeName` is absent or not a string.
    MissingTypeName,
    /// `attributes` is absent or not an object.
    MissingAttributes,
    /// `attributes.qualifiedName` is absent or not a string.
    MissingQualifiedName,
    /// The element looks like a process but does not have a process shape.
    MalformedProcess(String),
    /// The element looks like an asset but a modelled field has the wrong type.
    MalformedAsset(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "entity is not a JSON object"),
            Self::MissingTypeName => write!(f, "entity has no typeName"),
            Self::MissingAttributes => write!(f, "entity has no attributes object"),
            Self::MissingQualifiedName => write!(f, "entity has no attributes.qualifiedName"),
            Self::MalformedProcess(detail) => write!(f, "malformed process entity: {detail}"),
            Self::MalformedAsset(detail) => write!(f, "malformed asset entity: {detail}"),
        }
    }
}

const RELATIONSHIP_ATTRIBUTES: &str = "relationshipAttributes";

/// Removes a `relationshipAttributes` value that is not an object.
fn take_opaque_relationships(value: &mut Value) -> Option<Value> {
    let object = value.as_object_mut()?;
    if object.get(RELATIONSHIP_ATTRIBUTES).is_none_or(Value::is_object) {
        return None;
    }
    object.remove(RELATIONSHIP_ATTRIBUTES)
}

/// One classified element of an event's `entities` array.
#[derive(Debug, Clone, PartialEq)]
pub enum EventEntity {
    /// A process with inputs, outputs and a column mapping.
    Process(Box<ProcessEntity>),
    /// A plain asset.
    Asset(Box<AssetEntity>),
    /// An element that is not ingested.
    Skipped(SkipReason),
}

impl EventEntity {
    /// Classifies a raw entity document.
    ///
    /// Only `typeName` and `attributes.qualifiedName` are required of an
    /// asset. A `relationshipAttributes` value that is not an object is
    /// carried through untouched and nothing in it is rewritten.
    #[must_use]
    pub fn classify(mut value: Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self::Skipped(SkipReason::NotAnObject);
        };
        if !object.get("typeName").is_some_and(Value::is_string) {
            return Self::Skipped(SkipReason::MissingTypeName);
        }
        let Some(attributes) = object.get("attributes").and_then(Value::as_object) else {
            return Self::Skipped(SkipReason::MissingAttributes);
        };
        let is_process = attributes.contains_key("columnMapping");
        if !is_process && !attributes.get("qualifiedName").is_some_and(Value::is_string) {
            return Self::Skipped(SkipReason::MissingQualifiedName);
        }

        let opaque_relationships = take_opaque_relationships(&mut value);
        if is_process {
            return match serde_json::from_value::<ProcessEntity>(value) {
                Ok(mut process) => {
                    if let Some(raw) = opaque_relationships {
                        process.extra.insert(RELATIONSHIP_ATTRIBUTES.to_string(), raw);
                    }
                    Self::Process(Box::new(process))
                }
                Err(e) => Self::Skipped(SkipReason::MalformedProcess(e.to_string())),
            };
        }
        match serde_json::from_value::<AssetEntity>(value) {
            Ok(mut asset) => {
                if let Some(raw) = opaque_relationships {
                    asset.extra.insert(RELATIONSHIP_ATTRIBUTES.to_string(), raw);
                }
                Self::Asset(Box::new(asset))
            }
            Err(e) => Self::Skipped(SkipReason::MalformedAsset(e.to_string())),
        }
    }

    /// Returns a short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Process(_) => "process",
            Self::Asset(_) => "asset",
            Self::Skipped(_) => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_json() -> Value {
        json!({
            "typeName": "databricks_process",
            "guid": -1,
            "attributes": {
                "qualifiedName": "databricks://workspace/jobs/42/tasks/ingest",
                "name": "ingest",
                "inputs": [
                    {"typeName": "azure_datalake_gen2_path", "uniqueAttributes": {"qualifiedName": "warehouse/db/tableA"}}
                ],
                "outputs": [
                    {"typeName": "azure_sql_table", "uniqueAttributes": {"qualifiedName": "warehouse/db/tableB"}}
                ],
                "columnMapping": "[]",
                "sparkPlanDescription": "== Physical Plan =="
            },
            "relationshipAttributes": {
                "task": {"qualifiedName": "databricks://workspace/jobs/42", "guid": "abc"},
                "notebook": null
            }
        })
    }

    #[test]
    fn display_name_uses_last_non_empty_segment() {
        assert_eq!(display_name_for("warehouse/db/tableA"), "tableA");
        assert_eq!(display_name_for("warehouse/db/folder/"), "folder");
        assert_eq!(display_name_for("plain"), "plain");
        assert_eq!(display_name_for("/"), "/");
    }

    #[test]
    fn classifies_process_by_column_mapping() {
        let EventEntity::Process(process) = EventEntity::classify(process_json()) else {
            panic!("expected a process");
        };
        assert_eq!(process.attributes.inputs.len(), 1);
        assert_eq!(process.attributes.outputs[0].type_name, "azure_sql_table");
        assert!(matches!(
            process.relationship_attributes.get("task"),
            Some(RelationshipAttribute::Reference(_))
        ));
        assert!(matches!(
            process.relationship_attributes.get("notebook"),
            Some(RelationshipAttribute::Other(Value::Null))
        ));
    }

    #[test]
    fn process_round_trip_preserves_unmodelled_fields() {
        let EventEntity::Process(process) = EventEntity::classify(process_json()) else {
            panic!("expected a process");
        };
        let value = serde_json::to_value(&process).unwrap();
        assert_eq!(
            value["attributes"]["sparkPlanDescription"],
            "== Physical Plan =="
        );
        assert_eq!(value["relationshipAttributes"]["task"]["guid"], "abc");
        assert_eq!(value["guid"], -1);
    }

    #[test]
    fn entity_without_qualified_name_is_skipped() {
        let entity = EventEntity::classify(json!({"typeName": "t"}));
        assert_eq!(entity, EventEntity::Skipped(SkipReason::MissingAttributes));

        let entity = EventEntity::classify(json!({"typeName": "t", "attributes": {"name": "x"}}));
        assert_eq!(entity, EventEntity::Skipped(SkipReason::MissingQualifiedName));
    }

    #[test]
    fn entity_without_type_name_is_skipped() {
        let entity = EventEntity::classify(json!({"attributes": {"qualifiedName": "q"}}));
        assert_eq!(entity, EventEntity::Skipped(SkipReason::MissingTypeName));
        assert_eq!(
            EventEntity::classify(json!("nope")),
            EventEntity::Skipped(SkipReason::NotAnObject)
        );
    }

    #[test]
    fn process_without_qualified_name_is_malformed() {
        let entity = EventEntity::classify(json!({
            "typeName": "p",
            "attributes": {"columnMapping": "[]", "inputs": [], "outputs": []}
        }));
        assert!(matches!(
            entity,
            EventEntity::Skipped(SkipReason::MalformedProcess(_))
        ));
    }

    #[test]
    fn asset_is_classified() {
        let entity = EventEntity::classify(json!({
            "typeName": "azure_sql_table",
            "attributes": {"qualifiedName": "mssql://server/db/dbo/orders", "name": "orders"}
        }));
        let EventEntity::Asset(asset) = entity else {
            panic!("expected an asset");
        };
        assert_eq!(asset.to_lineage_ref().display_name, "orders");
    }

    #[test]
    fn numeric_name_is_kept_and_not_used_for_display() {
        let entity = EventEntity::classify(json!({
            "typeName": "azure_sql_table",
            "attributes": {"qualifiedName": "mssql://server/db/dbo/orders", "name": 42}
        }));
        let EventEntity::Asset(asset) = entity else {
            panic!("expected an asset, got {entity:?}");
        };
        assert_eq!(asset.to_lineage_ref().display_name, "orders");
        assert_eq!(serde_json::to_value(&asset).unwrap()["attributes"]["name"], 42);
    }

    #[test]
    fn non_object_relationship_attributes_pass_through() {
        for raw in [Value::Null, json!([{"qualifiedName": "a"}]), json!("x")] {
            let entity = EventEntity::classify(json!({
                "typeName": "azure_sql_table",
                "attributes": {"qualifiedName": "mssql://server/db/dbo/orders"},
                "relationshipAttributes": raw.clone()
            }));
            let EventEntity::Asset(asset) = entity else {
                panic!("expected an asset, got {entity:?}");
            };
            assert!(asset.relationship_attributes.is_empty());
            assert_eq!(serde_json::to_value(&asset).unwrap()["relationshipAttributes"], raw);
        }

        let mut process = process_json();
        process["relationshipAttributes"] = Value::Null;
        let EventEntity::Process(process) = EventEntity::classify(process) else {
            panic!("expected a process");
        };
        assert!(process.relationship_attributes.is_empty());
    }

    #[test]
    fn relationship_with_non_string_qualified_name_passes_through() {
        let attr: RelationshipAttribute =
            serde_json::from_value(json!({"qualifiedName": 7, "guid": 1})).unwrap();
        assert!(matches!(attr, RelationshipAttribute::Other(_)));
    }

    #[test]
    fn placeholder_lower_cases_qualified_name() {
        let reference = LineageEntityRef::new("Warehouse/DB/TableA", "azure_datalake_gen2_path");
        let resolved = ResolvedEntity::placeholder(EntityId::new(-1000), &reference, "generic");

        assert!(resolved.is_placeholder);
        assert_eq!(resolved.qualified_name, "warehouse/db/tablea");
        assert_eq!(resolved.original_type_name, "azure_datalake_gen2_path");
        let document = resolved.to_batch_document();
        assert_eq!(document["guid"], -1000);
        assert_eq!(document["typeName"], "generic");
        assert_eq!(document["attributes"]["qualifiedName"], "warehouse/db/tablea");
        assert_eq!(document["attributes"]["description"], "Data Assets TableA");
    }

    #[test]
    fn existing_keeps_catalog_casing() {
        let found = CatalogEntity::new(EntityId::new(42), "Warehouse/db/TableB", "azure_sql_table");
        let reference = LineageEntityRef::new("warehouse/db/tableb", "azure_sql_table");
        let resolved = ResolvedEntity::existing(&found, &reference);

        assert!(!resolved.is_placeholder);
        assert_eq!(resolved.qualified_name, "Warehouse/db/TableB");
        assert_eq!(
            resolved.to_batch_document()["attributes"]["qualifiedName"],
            "Warehouse/db/TableB"
        );
    }

    #[test]
    fn dataset_ref_apply_rewrites_name_and_type() {
        let mut dataset = DatasetRef::new("Warehouse/db/TableA", "azure_datalake_gen2_path");
        let resolved = ResolvedEntity::placeholder(
            EntityId::new(-1003),
            &dataset.to_lineage_ref(),
            "generic",
        );
        dataset.apply(&resolved);
        assert_eq!(dataset.type_name, "generic");
        assert_eq!(dataset.unique_attributes.qualified_name, "warehouse/db/tablea");
        assert_eq!(dataset.guid, None);

        let found = CatalogEntity::new(EntityId::new(42), "Warehouse/db/TableB", "azure_sql_table");
        let mut dataset = DatasetRef::new("warehouse/db/tableb", "azure_datalake_gen2_path");
        dataset.apply(&ResolvedEntity::existing(&found, &dataset.to_lineage_ref()));
        assert_eq!(dataset.guid, Some(Value::from(42)));
        assert_eq!(dataset.unique_attributes.qualified_name, "Warehouse/db/TableB");
    }
}
