//! `CatalogClient` over the Atlas v2 REST surface.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | lookup    | `GET  /api/atlas/v2/search/attribute?attrName=qualifiedName&attrValuePrefix={qn}&typeName={type}` |
//! | upsert    | `POST /api/atlas/v2/entity/bulk` with `{"entities": [...]}` |
//! | delete    | `DELETE /api/atlas/v2/entity/uniqueAttribute/type/{type}?attr:qualifiedName={qn}` |
//!
//! The attribute search is a prefix match, so results are filtered down to
//! the entity whose qualified name equals the requested one, ignoring case.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use olbridge_core::catalog::{CatalogClient, CatalogEntity, EntityBatch, UpsertResponse};
use olbridge_core::error::{Error, Result};
use olbridge_core::id::EntityId;

use crate::config::AtlasConfig;

const SEARCH_PATH: &str = "/api/atlas/v2/search/attribute";
const BULK_PATH: &str = "/api/atlas/v2/entity/bulk";
const UNIQUE_ATTRIBUTE_PATH: &str = "/api/atlas/v2/entity/uniqueAttribute/type";

/// Atlas v2 catalog client.
#[derive(Debug, Clone)]
pub struct AtlasCatalogClient {
    client: Client,
    config: AtlasConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    entities: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    guid: Value,
    type_name: String,
    #[serde(default)]
    attributes: SearchAttributes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchAttributes {
    qualified_name: Option<String>,
}

impl AtlasCatalogClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client cannot
    /// be constructed.
    pub fn new(config: AtlasConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::catalog_with_source("failed to create HTTP client", e))?;
        Ok(Self { client, config })
    }

    /// Returns the client settings.
    #[must_use]
    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base())
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

fn parse_id(guid: &Value) -> Result<EntityId> {
    let raw = match guid {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    };
    raw.map(EntityId::new)
        .ok_or_else(|| Error::catalog(format!("catalog returned a non-numeric guid: {guid}")))
}

#[async_trait]
impl CatalogClient for AtlasCatalogClient {
    async fn query_by_qualified_name(&self, qualified_name: &str) -> Result<Option<CatalogEntity>> {
        let req = self.client.get(self.url(SEARCH_PATH)).query(&[
            ("attrName", "qualifiedName"),
            ("attrValuePrefix", qualified_name),
            ("typeName", self.config.query_type_name.as_str()),
        ]);
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::catalog_with_source("search request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::catalog(format!("search failed ({status}): {body}")));
        }
        let results: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::catalog_with_source("failed to parse search response", e))?;

        let wanted = qualified_name.to_lowercase();
        let Some(hit) = results.entities.into_iter().find(|hit| {
            hit.attributes
                .qualified_name
                .as_deref()
                .is_some_and(|qn| qn.to_lowercase() == wanted)
        }) else {
            tracing::debug!(qualified_name, "no exact match in catalog");
            return Ok(None);
        };

        let id = parse_id(&hit.guid)?;
        let stored_name = hit
            .attributes
            .qualified_name
            .unwrap_or_else(|| qualified_name.to_string());
        Ok(Some(CatalogEntity::new(id, stored_name, hit.type_name)))
    }

    async fn upsert_batch(&self, batch: &EntityBatch) -> Result<UpsertResponse> {
        let req = self.client.post(self.url(BULK_PATH)).json(batch);
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::catalog_with_source("bulk upsert request failed", e))?;

        let status = response.status();
        let reason_phrase = status.canonical_reason().unwrap_or_default().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| Error::catalog_with_source("failed to read bulk upsert response", e))?;
        Ok(UpsertResponse::with_status(status.as_u16(), reason_phrase, body))
    }

    async fn delete_entity(&self, qualified_name: &str, type_name: &str) -> Result<()> {
        let url = self.url(&format!("{UNIQUE_ATTRIBUTE_PATH}/{type_name}"));
        let req = self
            .client
            .delete(url)
            .query(&[("attr:qualifiedName", qualified_name)]);
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| Error::catalog_with_source("delete request failed", e))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::catalog(format!(
            "delete of {qualified_name} ({type_name}) failed ({status}): {body}"
        )))
    }
}
