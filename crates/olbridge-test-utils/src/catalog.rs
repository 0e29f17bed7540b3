//! Catalog double with operation recording and failure injection.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use olbridge_core::catalog::{CatalogClient, CatalogEntity, EntityBatch, MemoryCatalog, UpsertResponse};
use olbridge_core::error::{Error, Result};

/// Record of a catalog call for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogOp {
    /// Lookup by qualified name.
    Query {
        /// Qualified name looked up.
        qualified_name: String,
    },
    /// Batch upsert.
    Upsert {
        /// Submitted batch.
        batch: EntityBatch,
    },
    /// Delete by qualified name and type.
    Delete {
        /// Qualified name deleted.
        qualified_name: String,
        /// Type name deleted.
        type_name: String,
    },
}

#[derive(Debug, Default)]
struct Failures {
    query_prefixes: Vec<String>,
    upserts: bool,
    upsert_response: Option<UpsertResponse>,
    deletes: bool,
}

/// In-memory catalog that records every call.
///
/// Calls are recorded before injected failures are applied, so a failed call
/// still shows up in [`operations`](Self::operations).
#[derive(Debug, Clone, Default)]
pub struct RecordingCatalog {
    inner: MemoryCatalog,
    operations: Arc<Mutex<Vec<CatalogOp>>>,
    failures: Arc<Mutex<Failures>>,
    latency: Option<Duration>,
}

impl RecordingCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = CatalogEntity>) -> Self {
        let catalog = Self::new();
        for entity in entities {
            catalog.insert(entity);
        }
        catalog
    }

    /// Creates a catalog whose calls each sleep for `latency`.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Seeds an entity.
    pub fn insert(&self, entity: CatalogEntity) {
        self.inner.insert(entity).expect("insert");
    }

    /// Returns the stored entity for `qualified_name`.
    pub fn get(&self, qualified_name: &str) -> Option<CatalogEntity> {
        self.inner.get(qualified_name).expect("get")
    }

    /// Returns all recorded operations in call order.
    pub fn operations(&self) -> Vec<CatalogOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Qualified names looked up, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                CatalogOp::Query { qualified_name } => Some(qualified_name),
                _ => None,
            })
            .collect()
    }

    /// Batches upserted, in call order.
    pub fn upserts(&self) -> Vec<EntityBatch> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                CatalogOp::Upsert { batch } => Some(batch),
                _ => None,
            })
            .collect()
    }

    /// `(qualified_name, type_name)` of every delete, in call order.
    pub fn deletes(&self) -> Vec<(String, String)> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                CatalogOp::Delete {
                    qualified_name,
                    type_name,
                } => Some((qualified_name, type_name)),
                _ => None,
            })
            .collect()
    }

    /// Fails lookups of qualified names starting with `prefix`.
    pub fn fail_queries_for(&self, prefix: impl Into<String>) {
        self.failures
            .lock()
            .expect("lock")
            .query_prefixes
            .push(prefix.into());
    }

    /// Fails every upsert with a transport error.
    pub fn fail_upserts(&self) {
        self.failures.lock().expect("lock").upserts = true;
    }

    /// Answers every upsert with `response` without storing anything.
    ///
    /// Clears a pending [`fail_upserts`](Self::fail_upserts).
    pub fn respond_to_upserts(&self, response: UpsertResponse) {
        let mut failures = self.failures.lock().expect("lock");
        failures.upserts = false;
        failures.upsert_response = Some(response);
    }

    /// Fails every delete with a transport error.
    pub fn fail_deletes(&self) {
        self.failures.lock().expect("lock").deletes = true;
    }

    fn record(&self, op: CatalogOp) {
        self.operations.lock().expect("lock").push(op);
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn injected(what: &str) -> Error {
    Error::catalog(format!("injected {what} failure"))
}

#[async_trait::async_trait]
impl CatalogClient for RecordingCatalog {
    async fn query_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CatalogEntity>> {
        self.maybe_delay().await;
        self.record(CatalogOp::Query {
            qualified_name: qualified_name.to_string(),
        });
        let fail = self
            .failures
            .lock()
            .expect("lock")
            .query_prefixes
            .iter()
            .any(|prefix| qualified_name.starts_with(prefix.as_str()));
        if fail {
            return Err(injected("query"));
        }
        self.inner.query_by_qualified_name(qualified_name).await
    }

    async fn upsert_batch(&self, batch: &EntityBatch) -> Result<UpsertResponse> {
        self.maybe_delay().await;
        self.record(CatalogOp::Upsert {
            batch: batch.clone(),
        });
        let (fail, canned) = {
            let failures = self.failures.lock().expect("lock");
            (failures.upserts, failures.upsert_response.clone())
        };
        if fail {
            return Err(injected("upsert"));
        }
        if let Some(response) = canned {
            return Ok(response);
        }
        self.inner.upsert_batch(batch).await
    }

    async fn delete_entity(&self, qualified_name: &str, type_name: &str) -> Result<()> {
        self.maybe_delay().await;
        self.record(CatalogOp::Delete {
            qualified_name: qualified_name.to_string(),
            type_name: type_name.to_string(),
        });
        if self.failures.lock().expect("lock").deletes {
            return Err(injected("delete"));
        }
        self.inner.delete_entity(qualified_name, type_name).await
    }
}
