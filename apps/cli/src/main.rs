//! FeedPulse CLI — periodic feedback-record digests from an issue tracker.
//!
//! Fetches new and changed records since the last run, asks a generative
//! text service for a structured digest, and delivers the rendered report.

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
