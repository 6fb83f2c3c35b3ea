//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `budgets` - Budget listing and the per-month summary/checklist view
//! - `core` - Init and shared utilities (open_db, budget_config)
//! - `serve` - Web server command
//! - `status` - Database status

pub mod budgets;
pub mod core;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use budgets::*;
pub use core::*;
pub use serve::*;
pub use status::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
