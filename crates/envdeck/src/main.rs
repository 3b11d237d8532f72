mod cli;
mod server;

use clap::Parser;

use crate::cli::{Cli, run_cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; ignore a missing file
    let _ = dotenv::dotenv();
    shared::logging::configure_logging()?;

    let cli = Cli::parse();

    run_cli(cli).await
}
