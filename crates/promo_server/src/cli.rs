//! Command-line interface for promo_server.

use clap::{Parser, Subcommand};
use promo_tictactoe::Difficulty;

/// Promo Server - tic-tac-toe results and promo codes
#[derive(Parser, Debug)]
#[command(name = "promo_server")]
#[command(about = "Promo code backend and terminal client for tic-tac-toe", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP result endpoint
    Serve {
        /// Path to the TOML config file (defaults are used when missing)
        #[arg(short, long, default_value = "promo.toml")]
        config: std::path::PathBuf,

        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Play in the terminal
    Play {
        /// Server to report results to. Results are not reported when omitted.
        #[arg(long)]
        server_url: Option<String>,

        /// easy, normal or hard
        #[arg(short, long, default_value = "normal")]
        difficulty: Difficulty,

        /// Let the computer open
        #[arg(long)]
        computer_first: bool,

        /// Delay before each computer move, in milliseconds
        #[arg(long, default_value = "400")]
        think_delay_ms: u64,
    },
}
