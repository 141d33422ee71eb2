use anyhow::{Context, Result};
use clap::Parser;
use recboard_core::RecBoardConfig;
use recboard_host::ipc_server;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Define command-line arguments using clap
#[derive(Parser, Debug)]
#[clap(
    name = "recboard-host",
    about = "RecBoard host daemon: loads reclists and stores recorded takes",
    version
)]
struct Args {
    #[clap(long, env = "RECBOARD_SOCKET")]
    /// Path of the Unix socket to listen on
    socket: Option<PathBuf>,

    #[clap(short, long)]
    /// Path to the configuration file
    config: Option<PathBuf>,

    #[clap(long)]
    /// Reclist used when a request does not name one
    reclist: Option<PathBuf>,

    #[clap(long)]
    /// ffmpeg executable used to convert recorded audio
    ffmpeg: Option<String>,

    #[clap(long, env = "RECBOARD_LOG")]
    /// Log level (trace, debug, info, warn, error)
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => RecBoardConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RecBoardConfig::load().context("Failed to load the default config")?,
    };

    let log_level = args
        .log_level
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(&log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting RecBoard host...");

    if let Some(reclist) = args.reclist {
        config.host.reclist_path = Some(reclist);
    }
    if let Some(ffmpeg) = args.ffmpeg {
        config.host.ffmpeg_path = ffmpeg;
    }
    let socket_path = args.socket.unwrap_or_else(|| config.resolve_socket_path());

    if let Err(e) = ipc_server::run_server(&config, &socket_path).await {
        error!("RecBoard host failed: {}", e);
        return Err(e).context(format!("Failed to serve on {}", socket_path.display()));
    }

    info!("RecBoard host stopped");
    Ok(())
}
