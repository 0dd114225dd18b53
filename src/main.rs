mod auth;
mod cli;
mod config;
mod error;
mod events;
mod output;
mod providers;
mod stability;
mod throughput;
mod timeutil;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting CdLens - software delivery metrics");
    cli.execute().await?;

    Ok(())
}
