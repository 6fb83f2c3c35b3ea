//! Budget aggregation
//!
//! Pure totals over a [`BudgetRecord`]. Nothing here is cached or persisted;
//! every read recomputes from the record's raw fields.

use serde::{Deserialize, Serialize};

use crate::models::{BudgetRecord, Event, Money};

/// Reference monthly allowance for day-to-day spending (£800)
pub const TARGET_DAILY_SPENDING: Money = Money::from_major(800);

/// Settings the aggregator needs beyond the record itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// Discretionary spending allowance reserved every month
    pub target_daily_spending: Money,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            target_daily_spending: TARGET_DAILY_SPENDING,
        }
    }
}

/// Mortgage + bills + travel + groceries
pub fn total_fixed_expenses(record: &BudgetRecord) -> Money {
    record.mortgage + record.bills + record.travel + record.groceries
}

pub fn total_event_spending(events: &[Event]) -> Money {
    events.iter().map(|e| e.amount).sum()
}

/// Recurring card payments plus every one-off repayment
pub fn total_credit_card_payments(record: &BudgetRecord) -> Money {
    let regular = record.barclaycard + record.monzo_flex + record.amex;
    let one_off: Money = record.one_off_repayments.iter().map(|r| r.amount).sum();
    regular + one_off
}

/// Wages left after fixed expenses, card payments, events and savings.
///
/// Negative when commitments exceed income.
pub fn initial_remaining_balance(record: &BudgetRecord) -> Money {
    record.wages
        - (total_fixed_expenses(record)
            + total_credit_card_payments(record)
            + total_event_spending(&record.events)
            + record.amount_to_save)
}

/// Headroom (positive) or shortfall (negative) after reserving the daily spending target
pub fn adjustment_needed(remaining_balance: Money, config: &BudgetConfig) -> Money {
    remaining_balance - config.target_daily_spending
}

/// Every aggregate for one record, as shown on the budget summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub wages: Money,
    pub total_fixed_expenses: Money,
    pub total_credit_card_payments: Money,
    pub total_event_spending: Money,
    pub amount_to_save: Money,
    pub initial_remaining_balance: Money,
    pub target_daily_spending: Money,
    pub adjustment_needed: Money,
}

impl BudgetSummary {
    pub fn compute(record: &BudgetRecord, config: &BudgetConfig) -> Self {
        let remaining = initial_remaining_balance(record);
        Self {
            wages: record.wages,
            total_fixed_expenses: total_fixed_expenses(record),
            total_credit_card_payments: total_credit_card_payments(record),
            total_event_spending: total_event_spending(&record.events),
            amount_to_save: record.amount_to_save,
            initial_remaining_balance: remaining,
            target_daily_spending: config.target_daily_spending,
            adjustment_needed: adjustment_needed(remaining, config),
        }
    }

    pub fn is_in_surplus(&self) -> bool {
        !self.adjustment_needed.is_negative()
    }
}
