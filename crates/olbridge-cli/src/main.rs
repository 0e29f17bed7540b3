//! olbridge CLI - replay lineage events into a metadata catalog.
//!
//! The main entry point for the `olbridge` CLI binary.

use anyhow::Result;
use clap::Parser;

use olbridge_cli::{Cli, Commands};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let config = cli.config()?;

    olbridge_core::init_logging(config.ingest.log_format);
    olbridge_ingest::metrics::register_metrics();

    // Create runtime and execute
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Ingest(args) => olbridge_cli::commands::ingest::execute(args, &config).await,
        }
    })
}
