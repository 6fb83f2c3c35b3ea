//! Tally Core Library
//!
//! Shared functionality for the Tally monthly budget tracker:
//! - Domain models (budget records, events, repayments, transfer checklists)
//! - Exact minor-unit money arithmetic
//! - Budget aggregation (totals, remaining balance, spending adjustment)
//! - Transfer checklist generation and reconciliation
//! - Database access with connection pooling and optional encryption

pub mod calc;
pub mod db;
pub mod error;
pub mod ids;
pub mod models;
pub mod transfers;

pub use calc::{BudgetConfig, BudgetSummary, TARGET_DAILY_SPENDING};
pub use db::Database;
pub use error::{Error, Result};
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use models::{AuditEntry, BudgetMonth, BudgetRecord, Event, Money, Repayment, TransferItem};
pub use transfers::{checklist, generate_transfer_list, reconcile, CanonicalTransfer};
