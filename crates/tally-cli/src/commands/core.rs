//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `budget_config` - Build the budget settings from CLI flags
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{bail, Context, Result};
use tally_core::{BudgetConfig, Database, Money};
use tracing::debug;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    debug!(path = path_str, encrypted = !no_encrypt, "Opening database");
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Budget settings from the --target-daily-spending flag (in pounds)
pub fn budget_config(target_daily_spending: f64) -> Result<BudgetConfig> {
    let target = Money::from_major_f64(target_daily_spending)
        .with_context(|| format!("Invalid target daily spending: {}", target_daily_spending))?;
    if target.is_negative() {
        bail!("Target daily spending must not be negative");
    }
    Ok(BudgetConfig {
        target_daily_spending: target,
    })
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;
    let count = db.count_budgets().context("Failed to read budgets")?;
    println!("   Budgets: {}", count);

    if db.is_encrypted() {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Start web UI: tally serve");
    println!("  2. Plan this month's budget in the browser");

    Ok(())
}
