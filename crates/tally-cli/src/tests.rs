//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use clap::Parser;
use tally_core::db::Database;
use tally_core::{BudgetConfig, BudgetMonth, BudgetRecord, Money, SequentialIds, TransferItem};

use crate::cli::{Cli, Commands};
use crate::commands::{self, checklist_line, truncate};

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

/// Save a May 2024 budget with one event, returning its id
fn create_test_budget(db: &Database) -> i64 {
    let ids = SequentialIds::new("e");
    let mut record = BudgetRecord::new(BudgetMonth::new(2024, 5).unwrap()).with_event(
        "Birthday",
        Money::from_major(50),
        &ids,
    );
    record.aim = "A deliberately long aim that will not fit in the column".into();
    record.wages = Money::from_major(3000);
    record.mortgage = Money::from_major(1000);
    db.create_budget(&record).unwrap().id.unwrap()
}

// ========== Budget Command Tests ==========

#[test]
fn test_cmd_budgets_empty() {
    let db = setup_test_db();
    assert!(commands::cmd_budgets(&db, &BudgetConfig::default(), false).is_ok());
}

#[test]
fn test_cmd_budgets_with_data() {
    let db = setup_test_db();
    create_test_budget(&db);

    let config = BudgetConfig::default();
    assert!(commands::cmd_budgets(&db, &config, false).is_ok());
    assert!(commands::cmd_budgets(&db, &config, true).is_ok());
}

#[test]
fn test_cmd_show() {
    let db = setup_test_db();
    let id = create_test_budget(&db);

    let config = BudgetConfig::default();
    assert!(commands::cmd_show(&db, &config, id, false).is_ok());
    assert!(commands::cmd_show(&db, &config, id, true).is_ok());
}

#[test]
fn test_cmd_show_missing_budget() {
    let db = setup_test_db();
    let err = commands::cmd_show(&db, &BudgetConfig::default(), 404, false).unwrap_err();
    assert!(err.to_string().contains("Budget 404 not found"));
}

#[test]
fn test_checklist_line() {
    let mut item = TransferItem::pending("mortgage", "Mortgage Payment", Money::from_major(1000));
    let line = checklist_line(&item);
    assert!(line.starts_with("[ ] Mortgage Payment"));
    assert!(line.ends_with("£1,000.00"));

    item.completed = true;
    assert!(checklist_line(&item).starts_with("[x] "));
}

// ========== Core Command Tests ==========

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");

    assert!(commands::cmd_init(&path, true).is_ok());
    assert!(path.exists());

    let db = commands::open_db(&path, true).unwrap();
    assert_eq!(db.count_budgets().unwrap(), 0);
    assert!(!db.is_encrypted());
}

#[test]
fn test_cmd_status() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.db");

    // Before init
    assert!(commands::cmd_status(&path, true).is_ok());

    commands::cmd_init(&path, true).unwrap();
    assert!(commands::cmd_status(&path, true).is_ok());
}

#[test]
fn test_budget_config() {
    let config = commands::budget_config(800.0).unwrap();
    assert_eq!(config, BudgetConfig::default());

    let config = commands::budget_config(650.5).unwrap();
    assert_eq!(config.target_daily_spending, Money::from_minor(65050));

    assert!(commands::budget_config(-1.0).is_err());
    assert!(commands::budget_config(f64::NAN).is_err());
}

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("exactly10!", 10), "exactly10!");
    assert_eq!(truncate("this is too long", 10), "this is...");
    assert_eq!(truncate("£££££", 4), "£...");
}

// ========== Argument Parsing Tests ==========

#[test]
fn test_parse_show_with_global_flags() {
    let cli = Cli::try_parse_from([
        "tally",
        "show",
        "3",
        "--json",
        "--db",
        "budgets.db",
        "--no-encrypt",
        "--target-daily-spending",
        "700",
    ])
    .unwrap();

    assert!(cli.no_encrypt);
    assert_eq!(cli.db.to_str(), Some("budgets.db"));
    assert_eq!(cli.target_daily_spending, 700.0);
    match cli.command {
        Commands::Show { id, json } => {
            assert_eq!(id, 3);
            assert!(json);
        }
        _ => panic!("expected show"),
    }
}

#[test]
fn test_parse_serve_defaults() {
    let cli = Cli::try_parse_from(["tally", "serve"]).unwrap();
    match cli.command {
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
            sign_in_path,
        } => {
            assert_eq!(port, 3000);
            assert_eq!(host, "127.0.0.1");
            assert!(!no_auth);
            assert!(static_dir.is_none());
            assert_eq!(sign_in_path, "/");
        }
        _ => panic!("expected serve"),
    }
}
