//! Error types for olbridge-ingest operations.

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur while ingesting a lineage event.
///
/// None of these cross the event boundary: the coordinator logs them and
/// folds them into an [`IngestOutcome`](crate::IngestOutcome).
#[derive(Debug, Error)]
pub enum IngestError {
    /// The catalog lookup for an asset failed.
    #[error("failed to resolve {qualified_name}")]
    Resolution {
        /// Qualified name that could not be resolved.
        qualified_name: String,
        /// Catalog failure.
        #[source]
        source: olbridge_core::Error,
    },

    /// The payload is not a JSON document.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// Description of the parse failure.
        message: String,
    },

    /// The payload has no `entities` array.
    #[error("payload has no entities array")]
    MissingEntities,

    /// The dedup store failed.
    #[error("dedup store error: {message}")]
    Dedup {
        /// Description of the store failure.
        message: String,
    },

    /// The column mapping could not be computed.
    #[error("column mapping error: {message}")]
    ColumnMapping {
        /// Description of the failure.
        message: String,
    },
}

impl IngestError {
    /// Creates a dedup store error.
    #[must_use]
    pub fn dedup(message: impl Into<String>) -> Self {
        Self::Dedup {
            message: message.into(),
        }
    }

    /// Creates a column mapping error.
    #[must_use]
    pub fn column_mapping(message: impl Into<String>) -> Self {
        Self::ColumnMapping {
            message: message.into(),
        }
    }
}
