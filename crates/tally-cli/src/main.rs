//! Tally CLI - Monthly budget tracker
//!
//! Usage:
//!   tally init                Initialize database
//!   tally budgets             List budgets
//!   tally show 3              Summary and checklist for budget 3
//!   tally serve --port 3000   Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let budget = commands::budget_config(cli.target_daily_spending)?;

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
            sign_in_path,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
                &sign_in_path,
                budget,
            )
            .await
        }
        Commands::Budgets { json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_budgets(&db, &budget, json)
        }
        Commands::Show { id, json } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_show(&db, &budget, id, json)
        }
        Commands::Status => commands::cmd_status(&cli.db, cli.no_encrypt),
    }
}
