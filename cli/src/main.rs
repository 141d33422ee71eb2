use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use recboard_cli::{app, RecBoardClient};
use recboard_core::RecBoardConfig;
use std::time::Duration;

mod cli;
mod logging;

use crate::cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RecBoardConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RecBoardConfig::load().context("Failed to load the default config")?,
    };

    let log_level = args
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "warn".to_string());
    logging::init(&log_level);

    let socket_path = args.socket.unwrap_or_else(|| config.resolve_socket_path());
    let client = match RecBoardClient::connect(&socket_path, &config.transport).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!(
                "{}",
                "Could not connect to the RecBoard host. Please ensure it is running.".red()
            );
            return Err(e).context(format!("Failed to connect to {}", socket_path.display()));
        }
    };
    let client = match args.timeout {
        Some(secs) => client.with_timeout(Some(Duration::from_secs(secs))),
        None => client,
    };

    let result = match args.command {
        Command::Load { reclist, json } => app::run_load(&client, reclist, json).await,
        Command::Save { path, input } => app::run_save(&client, &path, &input).await,
    };
    client.close().await;
    result
}
