//! Lineage event envelope.
//!
//! An event payload is a JSON object whose `entities` array holds the
//! catalog-shaped entities produced by the upstream parser. Everything else
//! in the envelope is ignored.

use serde_json::Value;

use olbridge_core::EventEntity;

use crate::dedup::DedupKey;
use crate::error::{IngestError, Result};

/// A parsed lineage event.
#[derive(Debug, Clone, PartialEq)]
pub struct LineageEvent {
    entities: Vec<Value>,
}

impl LineageEvent {
    /// Parses a raw event payload.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::InvalidPayload`] if the payload is not JSON and
    /// [`IngestError::MissingEntities`] if it has no `entities` array.
    pub fn parse(payload: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| IngestError::InvalidPayload {
                message: e.to_string(),
            })?;
        Self::from_value(value)
    }

    /// Builds an event from an already-parsed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::MissingEntities`] if the document has no
    /// `entities` array.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(mut envelope) => match envelope.remove("entities") {
                Some(Value::Array(entities)) => Ok(Self { entities }),
                _ => Err(IngestError::MissingEntities),
            },
            _ => Err(IngestError::MissingEntities),
        }
    }

    /// Creates an event from raw entity documents.
    #[must_use]
    pub fn from_entities(entities: Vec<Value>) -> Self {
        Self { entities }
    }

    /// Raw entity documents, in event order.
    #[must_use]
    pub fn entities(&self) -> &[Value] {
        &self.entities
    }

    /// Returns the dedup key of the entity set.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity array cannot be serialized.
    pub fn dedup_key(&self) -> Result<DedupKey> {
        DedupKey::from_entities(&self.entities)
    }

    /// Classifies every entity, in event order.
    pub fn into_entities(self) -> impl Iterator<Item = EventEntity> {
        self.entities.into_iter().map(EventEntity::classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_entities_array() {
        let event =
            LineageEvent::parse(r#"{"entities": [{"typeName": "t"}], "extra": true}"#).unwrap();
        assert_eq!(event.entities().len(), 1);
    }

    #[test]
    fn missing_entities_is_structural_error() {
        let err = LineageEvent::parse(r#"{"entity": []}"#).unwrap_err();
        assert!(matches!(err, IngestError::MissingEntities));

        let err = LineageEvent::from_value(json!({"entities": {"typeName": "t"}})).unwrap_err();
        assert!(matches!(err, IngestError::MissingEntities));

        let err = LineageEvent::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, IngestError::MissingEntities));
    }

    #[test]
    fn non_json_payload_is_invalid() {
        let err = LineageEvent::parse("not json").unwrap_err();
        assert!(matches!(err, IngestError::InvalidPayload { .. }));
    }

    #[test]
    fn into_entities_classifies_in_order() {
        let event = LineageEvent::from_entities(vec![
            json!({"typeName": "t", "attributes": {"qualifiedName": "a"}}),
            json!({"typeName": "t"}),
        ]);
        let kinds: Vec<&str> = event.into_entities().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["asset", "skipped"]);
    }
}
