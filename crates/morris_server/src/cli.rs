//! Command-line interface for the morris server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Nine Men's Morris - multiplayer match server
#[derive(Parser, Debug)]
#[command(name = "morris")]
#[command(about = "Nine Men's Morris match server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "morris.toml")]
    pub config: PathBuf,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP match server
    Serve {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database path, or ":memory:" (overrides the config file)
        #[arg(long)]
        database: Option<String>,
    },

    /// Print the persisted win ranking
    Ranking {
        /// SQLite database path (overrides the config file)
        #[arg(long)]
        database: Option<String>,
    },
}
