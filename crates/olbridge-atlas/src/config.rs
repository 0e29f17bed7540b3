//! Connection settings for the Atlas catalog.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use olbridge_core::config::{env_string, env_u64};
use olbridge_core::error::{Error, Result};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default type filter for qualified-name lookups.
pub const DEFAULT_QUERY_TYPE: &str = "Referenceable";

/// Connection settings for an Atlas v2 endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Base URL the `/api/atlas/v2` paths are appended to.
    pub base_url: String,

    /// Bearer token sent with every request.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Type name used to scope qualified-name lookups.
    #[serde(default = "default_query_type")]
    pub query_type_name: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_query_type() -> String {
    DEFAULT_QUERY_TYPE.to_string()
}

impl fmt::Debug for AtlasConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtlasConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("query_type_name", &self.query_type_name)
            .finish()
    }
}

impl AtlasConfig {
    /// Creates settings for `base_url` with defaults for everything else.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            query_type_name: DEFAULT_QUERY_TYPE.to_string(),
        }
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Loads settings through an arbitrary variable lookup.
    ///
    /// Recognized variables:
    /// - `OLBRIDGE_ATLAS_URL` (required)
    /// - `OLBRIDGE_ATLAS_TOKEN`
    /// - `OLBRIDGE_ATLAS_TIMEOUT_SECS`
    /// - `OLBRIDGE_ATLAS_QUERY_TYPE`
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is missing or a value fails to parse or
    /// validate.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = env_string(&lookup, "OLBRIDGE_ATLAS_URL")
            .ok_or_else(|| Error::InvalidInput("OLBRIDGE_ATLAS_URL is required".to_string()))?;
        let mut config = Self::new(base_url);
        config.token = env_string(&lookup, "OLBRIDGE_ATLAS_TOKEN");
        if let Some(timeout) = env_u64(&lookup, "OLBRIDGE_ATLAS_TIMEOUT_SECS")? {
            config.timeout_secs = timeout;
        }
        if let Some(query_type) = env_string(&lookup, "OLBRIDGE_ATLAS_QUERY_TYPE") {
            config.query_type_name = query_type;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not http(s) or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::InvalidInput(format!(
                "catalog URL must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "OLBRIDGE_ATLAS_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn loads_all_variables() {
        let config = AtlasConfig::from_lookup(lookup_from(&[
            ("OLBRIDGE_ATLAS_URL", "https://contoso.purview.azure.com/catalog/"),
            ("OLBRIDGE_ATLAS_TOKEN", "secret"),
            ("OLBRIDGE_ATLAS_TIMEOUT_SECS", "5"),
            ("OLBRIDGE_ATLAS_QUERY_TYPE", "DataSet"),
        ]))
        .unwrap();

        assert_eq!(config.base(), "https://contoso.purview.azure.com/catalog");
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.query_type_name, "DataSet");
    }

    #[test]
    fn url_is_required_and_checked() {
        assert!(AtlasConfig::from_lookup(lookup_from(&[])).is_err());
        assert!(
            AtlasConfig::from_lookup(lookup_from(&[("OLBRIDGE_ATLAS_URL", "ftp://x")])).is_err()
        );
        assert!(
            AtlasConfig::from_lookup(lookup_from(&[
                ("OLBRIDGE_ATLAS_URL", "http://x"),
                ("OLBRIDGE_ATLAS_TIMEOUT_SECS", "0"),
            ]))
            .is_err()
        );
    }

    #[test]
    fn debug_redacts_token() {
        let config = AtlasConfig::new("http://localhost").with_token("hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }
}
