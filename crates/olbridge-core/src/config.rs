//! Ingestion configuration.
//!
//! Settings are read from `OLBRIDGE_*` environment variables. The lookup is
//! abstracted behind a closure so tests can feed variables without touching
//! the process environment.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observability::LogFormat;

/// Catalog type used for placeholder entities and for cleanup deletes.
pub const GENERIC_ENTITY_TYPE: &str = "purview_custom_connector_generic_entity_with_columns";

/// Default lifetime of a dedup cache entry (1 hour).
pub const DEFAULT_DEDUP_TTL_SECS: u64 = 3600;

/// Configuration for the ingestion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Seconds an event's dedup key suppresses redeliveries.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,

    /// Catalog type given to placeholders and used when deleting them.
    #[serde(default = "default_placeholder_type_name")]
    pub placeholder_type_name: String,

    /// Log output format for binaries.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_dedup_ttl_secs() -> u64 {
    DEFAULT_DEDUP_TTL_SECS
}

fn default_placeholder_type_name() -> String {
    GENERIC_ENTITY_TYPE.to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            dedup_ttl_secs: DEFAULT_DEDUP_TTL_SECS,
            placeholder_type_name: GENERIC_ENTITY_TYPE.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl IngestConfig {
    /// Loads configuration through an arbitrary variable lookup.
    ///
    /// Recognized variables:
    /// - `OLBRIDGE_DEDUP_TTL_SECS`
    /// - `OLBRIDGE_PLACEHOLDER_TYPE`
    /// - `OLBRIDGE_LOG_FORMAT` (`json` or `pretty`)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unparseable value or the
    /// resulting configuration fails [`validate`](Self::validate).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ttl) = env_u64(&lookup, "OLBRIDGE_DEDUP_TTL_SECS")? {
            config.dedup_ttl_secs = ttl;
        }
        if let Some(type_name) = env_string(&lookup, "OLBRIDGE_PLACEHOLDER_TYPE") {
            config.placeholder_type_name = type_name;
        }
        if let Some(format) = env_string(&lookup, "OLBRIDGE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the dedup TTL is zero or the placeholder type is blank.
    pub fn validate(&self) -> Result<()> {
        if self.dedup_ttl_secs == 0 {
            return Err(Error::InvalidInput(
                "OLBRIDGE_DEDUP_TTL_SECS must be greater than zero".to_string(),
            ));
        }
        if self.placeholder_type_name.trim().is_empty() {
            return Err(Error::InvalidInput(
                "OLBRIDGE_PLACEHOLDER_TYPE must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the dedup TTL as a `chrono` duration.
    #[must_use]
    pub fn dedup_ttl(&self) -> chrono::Duration {
        i64::try_from(self.dedup_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Reads a trimmed, non-empty variable.
pub fn env_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Reads a `u64` variable.
///
/// # Errors
///
/// Returns an error if the variable is set but is not a valid `u64`.
pub fn env_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(lookup, name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}
