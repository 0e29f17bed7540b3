//! Observability infrastructure for olbridge.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by the ingestion
//! engine and the binaries.

use std::str::FromStr;
use std::sync::Once;

use serde::{Deserialize, Serialize};
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::Error;

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(Error::InvalidInput(format!(
                "unknown log format '{other}' (expected 'json' or 'pretty')"
            ))),
        }
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `olbridge_ingest=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span covering the ingestion of one lineage event.
///
/// `event_key` is the dedup key of the event's entity set, so every log line
/// of a run can be correlated with redeliveries of the same payload.
#[must_use]
pub fn ingest_span(event_key: &str) -> Span {
    tracing::info_span!("ingest", event_key = event_key)
}

/// Creates a span for a single catalog call.
#[must_use]
pub fn catalog_span(operation: &str, qualified_name: &str) -> Span {
    tracing::debug_span!("catalog", op = operation, qualified_name = qualified_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = ingest_span("c29tZS1rZXk=");
        let _guard = span.enter();
        let inner = catalog_span("query", "warehouse/db/tableA");
        let _inner_guard = inner.enter();
        tracing::info!("message inside nested spans");
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
