//! Budget listing and detail commands

use anyhow::{Context, Result};
use tally_core::{checklist, BudgetConfig, BudgetSummary, Database, Money, TransferItem};

use super::truncate;

/// One checklist row, e.g. `[x] Mortgage Payment            £1,000.00`
pub fn checklist_line(item: &TransferItem) -> String {
    let mark = if item.completed { "x" } else { " " };
    format!(
        "[{}] {:<32} {:>12}",
        mark,
        truncate(&item.description, 32),
        item.amount.to_string()
    )
}

/// `+£100.00` for headroom, `-£250.00` for a shortfall
fn signed(amount: Money) -> String {
    if amount.is_negative() {
        amount.to_string()
    } else {
        format!("+{}", amount)
    }
}

pub fn cmd_budgets(db: &Database, config: &BudgetConfig, json: bool) -> Result<()> {
    let budgets = db.list_budgets().context("Failed to list budgets")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&budgets)?);
        return Ok(());
    }

    if budgets.is_empty() {
        println!("No budgets yet. Plan one in the web UI:");
        println!("  tally serve");
        return Ok(());
    }

    println!();
    println!("📅 Budgets");
    println!("   ─────────────────────────────────────────────────────────────────────────");

    for budget in &budgets {
        let summary = BudgetSummary::compute(budget, config);
        let status = if summary.is_in_surplus() { "✅" } else { "⚠️ " };
        println!(
            "   #{:<4} {:<15} {:<24} wages {:>11}  save {:>10}  {} {}",
            budget.id.unwrap_or_default(),
            budget.month.label(),
            truncate(&budget.aim, 24),
            budget.wages.to_string(),
            budget.amount_to_save.to_string(),
            status,
            signed(summary.adjustment_needed)
        );
    }

    println!();
    println!("   {} budget(s). Details: tally show <id>", budgets.len());

    Ok(())
}

pub fn cmd_show(db: &Database, config: &BudgetConfig, id: i64, json: bool) -> Result<()> {
    let budget = db
        .get_budget(id)?
        .with_context(|| format!("Budget {} not found", id))?;
    let summary = BudgetSummary::compute(&budget, config);
    let transfers = checklist(&budget, config);

    if json {
        let output = serde_json::json!({
            "budget": budget,
            "summary": summary,
            "transfers": transfers,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!("📅 {} (#{})", budget.month.label(), id);
    if !budget.aim.is_empty() {
        println!("   Aim: {}", budget.aim);
    }
    println!("   ─────────────────────────────────────────────────────");
    println!("   Wages:                    {:>12}", summary.wages.to_string());
    println!(
        "   Fixed expenses:           {:>12}",
        summary.total_fixed_expenses.to_string()
    );
    println!(
        "   Credit card payments:     {:>12}",
        summary.total_credit_card_payments.to_string()
    );
    println!(
        "   Events:                   {:>12}",
        summary.total_event_spending.to_string()
    );
    println!(
        "   Savings:                  {:>12}",
        summary.amount_to_save.to_string()
    );
    println!(
        "   Remaining:                {:>12}",
        summary.initial_remaining_balance.to_string()
    );
    println!(
        "   Daily spending target:    {:>12}",
        summary.target_daily_spending.to_string()
    );
    println!(
        "   Adjustment:               {:>12}",
        signed(summary.adjustment_needed)
    );
    if !summary.is_in_surplus() {
        println!("   ⚠️  Commitments exceed income after the daily spending target");
    }

    let done = transfers.iter().filter(|t| t.completed).count();
    println!();
    println!("💸 Transfers ({}/{} done)", done, transfers.len());
    for item in &transfers {
        println!("   {}", checklist_line(item));
    }

    if !budget.upcoming_calendar_notes.is_empty() {
        println!();
        println!("🗓  Upcoming: {}", budget.upcoming_calendar_notes);
    }
    if !budget.previous_month_reflection.is_empty() {
        println!("💭 Last month: {}", budget.previous_month_reflection);
    }

    Ok(())
}
