//! # olbridge-cli
//!
//! Command-line interface for replaying lineage events into a metadata
//! catalog.
//!
//! ## Commands
//!
//! - `olbridge ingest` - Ingest newline-delimited lineage events from a file or stdin
//!
//! ## Configuration
//!
//! The CLI uses environment variables or command-line flags for settings:
//!
//! - `OLBRIDGE_ATLAS_URL` - Catalog endpoint (required unless `--dry-run`)
//! - `OLBRIDGE_ATLAS_TOKEN` - Bearer token for the catalog
//! - `OLBRIDGE_ATLAS_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `OLBRIDGE_DEDUP_TTL_SECS` - Redelivery suppression window (default: 3600)
//! - `OLBRIDGE_PLACEHOLDER_TYPE` - Catalog type for placeholder entities
//! - `OLBRIDGE_LOG_FORMAT` - `pretty` or `json` (default: `pretty`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use olbridge_atlas::AtlasConfig;
use olbridge_core::IngestConfig;

const ATLAS_URL: &str = "OLBRIDGE_ATLAS_URL";

/// olbridge - lineage-to-catalog bridge.
///
/// Every setting flag overrides the `OLBRIDGE_*` variable of the same name.
#[derive(Debug, Parser)]
#[command(name = "olbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog base URL (`OLBRIDGE_ATLAS_URL`).
    #[arg(long)]
    pub atlas_url: Option<String>,

    /// Catalog bearer token (`OLBRIDGE_ATLAS_TOKEN`).
    #[arg(long)]
    pub atlas_token: Option<String>,

    /// Catalog request timeout in seconds (`OLBRIDGE_ATLAS_TIMEOUT_SECS`).
    #[arg(long)]
    pub atlas_timeout_secs: Option<u64>,

    /// Type name used to scope qualified-name lookups (`OLBRIDGE_ATLAS_QUERY_TYPE`).
    #[arg(long)]
    pub atlas_query_type: Option<String>,

    /// Seconds a payload suppresses identical redeliveries (`OLBRIDGE_DEDUP_TTL_SECS`).
    #[arg(long)]
    pub dedup_ttl_secs: Option<u64>,

    /// Catalog type given to placeholder entities (`OLBRIDGE_PLACEHOLDER_TYPE`).
    #[arg(long)]
    pub placeholder_type: Option<String>,

    /// Log output format, `pretty` or `json` (`OLBRIDGE_LOG_FORMAT`).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration from flags and the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a setting fails to parse or validate.
    pub fn config(&self) -> Result<Config> {
        self.config_from(|name| std::env::var(name).ok())
    }

    /// Get the effective configuration from flags layered over `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a setting fails to parse or validate.
    pub fn config_from(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let layered = |name: &str| self.flag(name).or_else(|| lookup(name));

        let ingest =
            IngestConfig::from_lookup(&layered).context("invalid ingestion settings")?;
        let atlas = match layered(ATLAS_URL) {
            Some(_) => {
                Some(AtlasConfig::from_lookup(&layered).context("invalid catalog settings")?)
            }
            None => None,
        };

        Ok(Config {
            ingest,
            atlas,
            format: self.format.clone(),
        })
    }

    fn flag(&self, name: &str) -> Option<String> {
        match name {
            ATLAS_URL => self.atlas_url.clone(),
            "OLBRIDGE_ATLAS_TOKEN" => self.atlas_token.clone(),
            "OLBRIDGE_ATLAS_TIMEOUT_SECS" => self.atlas_timeout_secs.map(|v| v.to_string()),
            "OLBRIDGE_ATLAS_QUERY_TYPE" => self.atlas_query_type.clone(),
            "OLBRIDGE_DEDUP_TTL_SECS" => self.dedup_ttl_secs.map(|v| v.to_string()),
            "OLBRIDGE_PLACEHOLDER_TYPE" => self.placeholder_type.clone(),
            "OLBRIDGE_LOG_FORMAT" => self.log_format.clone(),
            _ => None,
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest newline-delimited lineage events.
    Ingest(commands::ingest::IngestArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Ingestion engine settings.
    pub ingest: IngestConfig,
    /// Catalog client settings, present when a catalog URL is configured.
    pub atlas: Option<AtlasConfig>,
    /// Output format.
    pub format: OutputFormat,
}

impl Config {
    /// Returns the catalog client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no catalog URL is configured.
    pub fn atlas(&self) -> Result<&AtlasConfig> {
        self.atlas
            .as_ref()
            .context("Catalog URL is required. Set OLBRIDGE_ATLAS_URL or use --atlas-url")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use olbridge_atlas::config::DEFAULT_TIMEOUT_SECS;
    use olbridge_core::LogFormat;
    use olbridge_core::config::GENERIC_ENTITY_TYPE;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_cli_config_from_flags() {
        let cli = Cli::parse_from([
            "olbridge",
            "--atlas-url",
            "https://contoso.purview.azure.com/catalog",
            "--atlas-token",
            "token-abc",
            "--dedup-ttl-secs",
            "60",
            "--placeholder-type",
            "generic_dataset",
            "--log-format",
            "json",
            "--format",
            "json",
            "ingest",
            "--dry-run",
        ]);

        let config = cli.config_from(lookup_from(&[])).unwrap();
        assert_eq!(config.ingest.dedup_ttl_secs, 60);
        assert_eq!(config.ingest.placeholder_type_name, "generic_dataset");
        assert_eq!(config.ingest.log_format, LogFormat::Json);
        assert!(matches!(config.format, OutputFormat::Json));

        let atlas = config.atlas().unwrap();
        assert_eq!(atlas.base(), "https://contoso.purview.azure.com/catalog");
        assert_eq!(atlas.token.as_deref(), Some("token-abc"));
        assert_eq!(atlas.timeout_secs, DEFAULT_TIMEOUT_SECS);

        let Commands::Ingest(args) = cli.command;
        assert!(args.dry_run);
        assert!(args.file.is_none());
    }

    #[test]
    fn test_flags_override_environment() {
        let cli = Cli::parse_from(["olbridge", "--dedup-ttl-secs", "5", "ingest"]);
        let config = cli
            .config_from(lookup_from(&[
                ("OLBRIDGE_DEDUP_TTL_SECS", "900"),
                ("OLBRIDGE_PLACEHOLDER_TYPE", "env_type"),
                ("OLBRIDGE_ATLAS_URL", "http://localhost:21000"),
                ("OLBRIDGE_ATLAS_TIMEOUT_SECS", "7"),
            ]))
            .unwrap();

        assert_eq!(config.ingest.dedup_ttl_secs, 5);
        assert_eq!(config.ingest.placeholder_type_name, "env_type");
        assert_eq!(config.atlas().unwrap().timeout_secs, 7);
    }

    #[test]
    fn test_catalog_url_required_for_live_runs() {
        let cli = Cli::parse_from(["olbridge", "ingest"]);
        let config = cli.config_from(lookup_from(&[])).unwrap();
        assert_eq!(config.ingest.placeholder_type_name, GENERIC_ENTITY_TYPE);
        let err = config.atlas().unwrap_err();
        assert!(err.to_string().contains("OLBRIDGE_ATLAS_URL"));

        let cli = Cli::parse_from(["olbridge", "--atlas-url", "localhost:21000", "ingest"]);
        assert!(cli.config_from(lookup_from(&[])).is_err());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let cli = Cli::parse_from(["olbridge", "--log-format", "xml", "ingest"]);
        assert!(cli.config_from(lookup_from(&[])).is_err());

        let cli = Cli::parse_from(["olbridge", "ingest"]);
        assert!(
            cli.config_from(lookup_from(&[("OLBRIDGE_DEDUP_TTL_SECS", "0")]))
                .is_err()
        );
    }
}
