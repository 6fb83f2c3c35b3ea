//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Plan the month, then tick off the transfers
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted monthly budget tracker", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Monthly allowance for day-to-day spending, in pounds
    #[arg(
        long,
        global = true,
        env = "TALLY_TARGET_DAILY_SPENDING",
        default_value = "800"
    )]
    pub target_daily_spending: f64,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a session from the identity proxy,
        /// an API key, or a trusted network.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,

        /// Where visitors without a session are sent from budget pages
        #[arg(long, default_value = "/")]
        sign_in_path: String,
    },

    /// List all budgets, newest month first
    Budgets {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one budget's summary and transfer checklist
    Show {
        /// Budget ID
        id: i64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show database status
    Status,
}
