//! Ingest command - replay newline-delimited lineage events into the catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use olbridge_atlas::AtlasCatalogClient;
use olbridge_core::{CatalogClient, MemoryCatalog};
use olbridge_ingest::{IngestOutcome, IngestionCoordinator};

use crate::{Config, OutputFormat};

/// Arguments for the ingest command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File with one JSON event per line. Reads stdin when omitted.
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Resolve against an empty in-memory catalog and print what would be sent.
    #[arg(long)]
    pub dry_run: bool,
}

/// Per-outcome event counts for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestTally {
    /// Events read.
    pub total: usize,
    /// Events whose main batch was submitted.
    pub submitted: usize,
    /// Events suppressed as redeliveries.
    pub duplicates: usize,
    /// Events that were not sent or had nothing to load.
    pub failed: usize,
}

impl IngestTally {
    fn record(&mut self, outcome: &IngestOutcome) {
        self.total += 1;
        match outcome {
            IngestOutcome::Submitted(_) => self.submitted += 1,
            IngestOutcome::AlreadyRegistered => self.duplicates += 1,
            IngestOutcome::NothingToLoad(_) | IngestOutcome::NotSent { .. } => self.failed += 1,
        }
    }
}

/// Execute the ingest command.
///
/// # Errors
///
/// Returns an error if no catalog is configured for a live run, the input
/// cannot be read, or any event was not ingested.
pub async fn execute(args: IngestArgs, config: &Config) -> Result<()> {
    let dry_run_catalog = args.dry_run.then(MemoryCatalog::new);
    let catalog: Arc<dyn CatalogClient> = match &dry_run_catalog {
        Some(memory) => Arc::new(memory.clone()),
        None => Arc::new(
            AtlasCatalogClient::new(config.atlas()?.clone())
                .context("Failed to create catalog client")?,
        ),
    };
    let coordinator = IngestionCoordinator::new(catalog, &config.ingest);

    let tally = match &args.file {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open event file: {}", path.display()))?;
            ingest_lines(&coordinator, BufReader::new(file), &config.format).await?
        }
        None => {
            ingest_lines(&coordinator, BufReader::new(tokio::io::stdin()), &config.format).await?
        }
    };

    if let Some(memory) = dry_run_catalog {
        print_dry_run(&memory, &config.format)?;
    }

    tracing::info!(
        total = tally.total,
        submitted = tally.submitted,
        duplicates = tally.duplicates,
        failed = tally.failed,
        "ingest finished"
    );
    if tally.failed > 0 {
        anyhow::bail!("{} of {} events were not ingested", tally.failed, tally.total);
    }
    Ok(())
}

/// Ingests every non-blank line of `reader` as one event and prints its
/// outcome.
///
/// # Errors
///
/// Returns an error if reading the input fails. Per-event failures are
/// counted in the tally instead.
pub async fn ingest_lines<R>(
    coordinator: &IngestionCoordinator,
    reader: R,
    format: &OutputFormat,
) -> Result<IngestTally>
where
    R: AsyncBufRead + Unpin,
{
    let mut tally = IngestTally::default();
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read event input")? {
        line_number += 1;
        let payload = line.trim();
        if payload.is_empty() {
            continue;
        }

        let outcome = coordinator.ingest(payload).await;
        tally.record(&outcome);
        print_outcome(line_number, &outcome, format);
    }

    Ok(tally)
}

fn print_outcome(line_number: usize, outcome: &IngestOutcome, format: &OutputFormat) {
    match format {
        OutputFormat::Json => {
            let summary = outcome.summary();
            println!(
                "{}",
                json!({
                    "line": line_number,
                    "outcome": outcome.label(),
                    "message": outcome.to_string(),
                    "entities": summary.map(|s| s.main_batch_size),
                    "placeholders": summary.map(|s| s.placeholder_batch_size),
                    "cleanupFailed": summary.map(|s| s.cleanup_failed),
                })
            );
        }
        OutputFormat::Text => println!("line {line_number}: {outcome}"),
    }
}

fn print_dry_run(catalog: &MemoryCatalog, format: &OutputFormat) -> Result<()> {
    let upserts = catalog.upserts()?;
    let deletes = catalog.deletes()?;

    match format {
        OutputFormat::Json => {
            let deletes: Vec<_> = deletes
                .iter()
                .map(|d| json!({"qualifiedName": d.qualified_name, "typeName": d.type_name}))
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({"upserts": upserts, "deletes": deletes}))?
            );
        }
        OutputFormat::Text => {
            println!();
            println!("Dry run: {} upsert batches, {} deletes", upserts.len(), deletes.len());
            for (i, batch) in upserts.iter().enumerate() {
                println!("  upsert #{} ({} entities):", i + 1, batch.len());
                println!("{}", serde_json::to_string_pretty(batch)?);
            }
            for delete in &deletes {
                println!("  delete {} ({})", delete.qualified_name, delete.type_name);
            }
        }
    }
    Ok(())
}
