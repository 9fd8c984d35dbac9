//! # Ratings CLI Binary
//!
//! Command-line interface over the rating engine.

use anyhow::Result;
use clap::Parser;
use rating_analytics::cli::{Cli, CliHandler};
use rating_analytics::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(cli.json)?;

    let config = cli.resolve_config()?;
    let handler = CliHandler::new(config, cli.rebuild)?;

    handler.handle_command(cli.command).await?;

    Ok(())
}
