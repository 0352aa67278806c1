//! Command-line interface for the `summoners` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Summoners - two-player networked board game
#[derive(Parser, Debug)]
#[command(name = "summoners")]
#[command(about = "Play Summoners over a relay, or run the relay", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the message relay
    Relay {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Join a relay and play one side
    Play {
        /// Relay base URL (overrides config)
        #[arg(long)]
        relay_url: Option<String>,

        /// Print the state as JSON instead of a text board
        #[arg(long)]
        json: bool,
    },

    /// Play both sides on this terminal
    Hotseat {
        /// Print the state as JSON instead of a text board
        #[arg(long)]
        json: bool,
    },
}
