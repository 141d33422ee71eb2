use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line client for the RecBoard host daemon
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Specify the path to the host's IPC socket
    #[arg(long, env = "RECBOARD_SOCKET")]
    pub socket: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Give up on a request after this many seconds (default: wait for the reply)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RECBOARD_LOG")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a reclist through the host and print its entries
    Load {
        /// Reclist file on the host; defaults to the host's configured list
        #[arg(long)]
        reclist: Option<PathBuf>,

        /// Print the entries as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Send a recorded take to the host to be converted and stored
    Save {
        /// Destination wav path on the host
        #[arg(index = 1)]
        path: PathBuf,

        /// Recording to send
        #[arg(short, long)]
        input: PathBuf,
    },
}
