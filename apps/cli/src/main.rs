//! Intake CLI — survey-response artifact ingestion.
//!
//! Attaches documents, recordings, and YouTube links to respondent records
//! from a mapping spreadsheet, with idempotent re-runs and a forensic
//! audit trail.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
