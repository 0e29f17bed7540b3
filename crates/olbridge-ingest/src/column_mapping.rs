//! Column-level lineage for process entities.
//!
//! The `columnMapping` attribute is a JSON document serialized into a string:
//!
//! ```json
//! [
//!   {
//!     "DatasetMapping": {"Source": "warehouse/db/tableA", "Sink": "warehouse/db/tableB"},
//!     "ColumnMapping": [{"Source": "id", "Sink": "id"}]
//!   }
//! ]
//! ```
//!
//! Dataset names in it must match the qualified names the inputs and outputs
//! resolved to, which is what the run's translation table provides.

use serde_json::Value;

use olbridge_core::ProcessEntity;

use crate::error::{IngestError, Result};
use crate::resolver::QualifiedNameTranslations;

/// Computes the `columnMapping` attribute of a process.
pub trait ColumnMappingProvider: Send + Sync {
    /// Returns the value to store in `attributes.columnMapping`.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping cannot be computed. The coordinator
    /// then keeps the mapping the event carried.
    fn column_mapping(
        &self,
        process: &ProcessEntity,
        translations: &QualifiedNameTranslations,
    ) -> Result<Value>;
}

impl<F> ColumnMappingProvider for F
where
    F: Fn(&ProcessEntity, &QualifiedNameTranslations) -> Result<Value> + Send + Sync,
{
    fn column_mapping(
        &self,
        process: &ProcessEntity,
        translations: &QualifiedNameTranslations,
    ) -> Result<Value> {
        self(process, translations)
    }
}

/// Rewrites the dataset names of the event's own column mapping through the
/// translation table.
///
/// Column names are left alone. A mapping received as an array is returned
/// serialized, so the submitted attribute is always a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranslatedColumnMapping;

const DATASET_MAPPING: &str = "DatasetMapping";
const DATASET_KEYS: [&str; 2] = ["Source", "Sink"];

impl ColumnMappingProvider for TranslatedColumnMapping {
    fn column_mapping(
        &self,
        process: &ProcessEntity,
        translations: &QualifiedNameTranslations,
    ) -> Result<Value> {
        let mut mapping = match &process.attributes.column_mapping {
            Value::String(raw) if raw.trim().is_empty() => return Ok(Value::String(raw.clone())),
            Value::String(raw) => serde_json::from_str::<Value>(raw).map_err(|e| {
                IngestError::column_mapping(format!("columnMapping is not valid JSON: {e}"))
            })?,
            Value::Null => return Ok(Value::Null),
            other => other.clone(),
        };

        let Some(datasets) = mapping.as_array_mut() else {
            return Err(IngestError::column_mapping("columnMapping is not an array"));
        };
        for dataset in datasets {
            let Some(names) = dataset.get_mut(DATASET_MAPPING).and_then(Value::as_object_mut) else {
                continue;
            };
            for key in DATASET_KEYS {
                if let Some(Value::String(name)) = names.get_mut(key) {
                    if let Some(resolved) = translations.get(name.as_str()) {
                        *name = resolved.to_string();
                    }
                }
            }
        }

        let serialized = serde_json::to_string(&mapping)
            .map_err(|e| IngestError::column_mapping(e.to_string()))?;
        Ok(Value::String(serialized))
    }
}
