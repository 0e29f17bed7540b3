//! Metadata catalog contract.
//!
//! The ingestion engine talks to the catalog through three calls:
//! - look up an entity by qualified name
//! - upsert a batch of entity documents wrapped as `{"entities": [...]}`
//! - delete an entity by qualified name and type
//!
//! [`MemoryCatalog`] implements the contract in process for dry runs and
//! tests. It matches qualified names case-insensitively and reports the
//! casing it stored, mirroring catalogs that normalize names on write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::id::EntityId;

/// An entity as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntity {
    /// Catalog-assigned identifier.
    pub id: EntityId,
    /// Qualified name as stored by the catalog.
    pub qualified_name: String,
    /// Catalog type name.
    pub type_name: String,
}

impl CatalogEntity {
    /// Creates a catalog entity.
    #[must_use]
    pub fn new(
        id: EntityId,
        qualified_name: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            qualified_name: qualified_name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A batch of entity documents submitted in one upsert call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBatch {
    /// Entity documents.
    pub entities: Vec<Value>,
}

impl EntityBatch {
    /// Wraps entity documents into a batch.
    #[must_use]
    pub fn new(entities: Vec<Value>) -> Self {
        Self { entities }
    }

    /// Number of documents in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the batch holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Response to an upsert call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    /// HTTP-style status code.
    pub status: u16,
    /// Reason phrase accompanying the status.
    pub reason_phrase: String,
    /// Response body.
    pub body: String,
}

impl UpsertResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason_phrase: "OK".to_string(),
            body: body.into(),
        }
    }

    /// Creates a response with an arbitrary status.
    #[must_use]
    pub fn with_status(status: u16, reason_phrase: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status,
            reason_phrase: reason_phrase.into(),
            body: body.into(),
        }
    }

    /// Returns true if the catalog accepted the batch.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Client for the remote metadata catalog.
///
/// Implementations must be safe to share across concurrent ingestion runs.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Looks up an entity by qualified name.
    ///
    /// Returns `Ok(None)` when the catalog holds no such entity.
    async fn query_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CatalogEntity>>;

    /// Upserts a batch of entity documents.
    ///
    /// A rejected batch is reported through [`UpsertResponse::is_ok`], not as
    /// an error. `Err` is reserved for transport failures.
    async fn upsert_batch(&self, batch: &EntityBatch) -> Result<UpsertResponse>;

    /// Deletes the entity with the given qualified name and type.
    ///
    /// Succeeds when no such entity exists.
    async fn delete_entity(&self, qualified_name: &str, type_name: &str) -> Result<()>;
}

#[async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
    async fn query_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CatalogEntity>> {
        (**self).query_by_qualified_name(qualified_name).await
    }

    async fn upsert_batch(&self, batch: &EntityBatch) -> Result<UpsertResponse> {
        (**self).upsert_batch(batch).await
    }

    async fn delete_entity(&self, qualified_name: &str, type_name: &str) -> Result<()> {
        (**self).delete_entity(qualified_name, type_name).await
    }
}

// ============================================================================
// In-memory catalog
// ============================================================================

/// A delete call recorded by [`MemoryCatalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRecord {
    /// Qualified name passed to the delete.
    pub qualified_name: String,
    /// Type name passed to the delete.
    pub type_name: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by lower-cased qualified name.
    entities: HashMap<String, CatalogEntity>,
    upserts: Vec<EntityBatch>,
    deletes: Vec<DeleteRecord>,
    next_id: i64,
}

/// In-memory catalog.
///
/// Thread-safe via `RwLock`. Upserted documents with a negative or missing
/// `guid` are assigned fresh positive ids.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entity with a known id, replacing any entity with the same
    /// qualified name.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn insert(&self, entity: CatalogEntity) -> Result<()> {
        let mut state = self.write()?;
        state.next_id = state.next_id.max(entity.id.get());
        state
            .entities
            .insert(entity.qualified_name.to_lowercase(), entity);
        Ok(())
    }

    /// Returns the entity stored under a qualified name.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn get(&self, qualified_name: &str) -> Result<Option<CatalogEntity>> {
        Ok(self
            .read()?
            .entities
            .get(&qualified_name.to_lowercase())
            .cloned())
    }

    /// Returns every batch upserted so far, in call order.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn upserts(&self) -> Result<Vec<EntityBatch>> {
        Ok(self.read()?.upserts.clone())
    }

    /// Returns every delete issued so far, in call order.
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned.
    pub fn deletes(&self) -> Result<Vec<DeleteRecord>> {
        Ok(self.read()?.deletes.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })
    }
}

#[async_trait]
impl CatalogClient for MemoryCatalog {
    async fn query_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CatalogEntity>> {
        self.get(qualified_name)
    }

    async fn upsert_batch(&self, batch: &EntityBatch) -> Result<UpsertResponse> {
        let mut state = self.write()?;
        state.upserts.push(batch.clone());

        let mut stored = 0usize;
        for document in &batch.entities {
            let Some(qualified_name) = document
                .pointer("/attributes/qualifiedName")
                .and_then(Value::as_str)
            else {
                return Ok(UpsertResponse::with_status(
                    400,
                    "Bad Request",
                    "entity is missing attributes.qualifiedName",
                ));
            };
            let type_name = document
                .get("typeName")
                .and_then(Value::as_str)
                .unwrap_or_default();

            let key = qualified_name.to_lowercase();
            let existing = state.entities.get(&key).map(|entity| entity.id);
            let id = match existing {
                Some(id) => id,
                None => match document.get("guid").and_then(Value::as_i64) {
                    Some(guid) if guid > 0 => EntityId::new(guid),
                    _ => {
                        state.next_id += 1;
                        EntityId::new(state.next_id)
                    }
                },
            };
            state
                .entities
                .insert(key, CatalogEntity::new(id, qualified_name, type_name));
            stored += 1;
        }

        Ok(UpsertResponse::ok(format!("{{\"stored\":{stored}}}")))
    }

    async fn delete_entity(&self, qualified_name: &str, type_name: &str) -> Result<()> {
        let mut state = self.write()?;
        state.deletes.push(DeleteRecord {
            qualified_name: qualified_name.to_string(),
            type_name: type_name.to_string(),
        });

        let key = qualified_name.to_lowercase();
        if state
            .entities
            .get(&key)
            .is_some_and(|entity| entity.type_name == type_name)
        {
            state.entities.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn query_is_case_insensitive_and_keeps_stored_casing() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(
                EntityId::new(42),
                "Warehouse/db/TableB",
                "azure_sql_table",
            ))
            .unwrap();

        let found = catalog
            .query_by_qualified_name("warehouse/db/tableb")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, EntityId::new(42));
        assert_eq!(found.qualified_name, "Warehouse/db/TableB");

        assert!(
            catalog
                .query_by_qualified_name("warehouse/db/missing")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn upsert_assigns_ids_to_new_entities() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(EntityId::new(42), "a", "t"))
            .unwrap();

        let batch = EntityBatch::new(vec![
            json!({"typeName": "t", "guid": -1000, "attributes": {"qualifiedName": "b"}}),
            json!({"typeName": "t", "guid": -1001, "attributes": {"qualifiedName": "A"}}),
        ]);
        let response = catalog.upsert_batch(&batch).await.unwrap();

        assert!(response.is_ok());
        assert_eq!(catalog.get("b").unwrap().unwrap().id, EntityId::new(43));
        assert_eq!(catalog.get("a").unwrap().unwrap().id, EntityId::new(42));
        assert_eq!(catalog.upserts().unwrap(), vec![batch]);
    }

    #[tokio::test]
    async fn upsert_rejects_documents_without_qualified_name() {
        let catalog = MemoryCatalog::new();
        let batch = EntityBatch::new(vec![json!({"typeName": "t"})]);
        let response = catalog.upsert_batch(&batch).await.unwrap();
        assert!(!response.is_ok());
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn delete_only_removes_matching_type() {
        let catalog = MemoryCatalog::new();
        catalog
            .insert(CatalogEntity::new(EntityId::new(1), "q", "generic"))
            .unwrap();
        catalog
            .insert(CatalogEntity::new(EntityId::new(2), "r", "azure_sql_table"))
            .unwrap();

        catalog.delete_entity("q", "generic").await.unwrap();
        catalog.delete_entity("r", "generic").await.unwrap();
        catalog.delete_entity("missing", "generic").await.unwrap();

        assert!(catalog.get("q").unwrap().is_none());
        assert!(catalog.get("r").unwrap().is_some());
        assert_eq!(catalog.deletes().unwrap().len(), 3);
    }
}
