//! Error types and result aliases for olbridge.
//!
//! This module defines the shared error type used by the catalog contract and
//! the ambient infrastructure (configuration, serialization).

/// The result type used throughout olbridge.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in olbridge operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A call to the metadata catalog failed.
    #[error("catalog error: {message}")]
    Catalog {
        /// Description of the catalog failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new catalog error with the given message.
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new catalog error with a source cause.
    #[must_use]
    pub fn catalog_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Catalog {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_keeps_source() {
        let io = std::io::Error::other("connection reset");
        let err = Error::catalog_with_source("upsert failed", io);
        assert_eq!(err.to_string(), "catalog error: upsert failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn serde_errors_convert_to_serialization() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(parse);
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
