//! Transfer checklist generation
//!
//! A checklist is the nine canonical transfers in a fixed order, then one item
//! per one-off repayment, then one item per event. The order is what the user
//! sees and must not change.

use std::collections::HashMap;

use crate::calc::BudgetConfig;
use crate::models::{BudgetRecord, Money, TransferItem};

pub const REPAYMENT_PREFIX: &str = "repayment-";
pub const EVENT_PREFIX: &str = "event-";

/// The fixed budget categories that always appear on the checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalTransfer {
    Mortgage,
    Bills,
    Travel,
    Groceries,
    Barclaycard,
    MonzoFlex,
    Amex,
    Savings,
    DailySpending,
}

impl CanonicalTransfer {
    /// Checklist order
    pub const ALL: [CanonicalTransfer; 9] = [
        Self::Mortgage,
        Self::Bills,
        Self::Travel,
        Self::Groceries,
        Self::Barclaycard,
        Self::MonzoFlex,
        Self::Amex,
        Self::Savings,
        Self::DailySpending,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Mortgage => "mortgage",
            Self::Bills => "bills",
            Self::Travel => "travel",
            Self::Groceries => "groceries",
            Self::Barclaycard => "barclaycard",
            Self::MonzoFlex => "monzo-flex",
            Self::Amex => "amex",
            Self::Savings => "savings",
            Self::DailySpending => "daily-spending",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Mortgage => "Mortgage Payment",
            Self::Bills => "Bills Payment",
            Self::Travel => "Travel Expenses",
            Self::Groceries => "Groceries Budget",
            Self::Barclaycard => "Barclaycard Payment",
            Self::MonzoFlex => "Monzo Flex Payment",
            Self::Amex => "Amex Payment",
            Self::Savings => "Savings Transfer",
            Self::DailySpending => "Daily Spending Pot",
        }
    }

    pub fn amount(&self, record: &BudgetRecord, config: &BudgetConfig) -> Money {
        match self {
            Self::Mortgage => record.mortgage,
            Self::Bills => record.bills,
            Self::Travel => record.travel,
            Self::Groceries => record.groceries,
            Self::Barclaycard => record.barclaycard,
            Self::MonzoFlex => record.monzo_flex,
            Self::Amex => record.amex,
            Self::Savings => record.amount_to_save,
            Self::DailySpending => config.target_daily_spending,
        }
    }
}

pub fn repayment_transfer_id(repayment_id: &str) -> String {
    format!("{}{}", REPAYMENT_PREFIX, repayment_id)
}

pub fn event_transfer_id(event_id: &str) -> String {
    format!("{}{}", EVENT_PREFIX, event_id)
}

/// Build a fresh checklist for a record, every item pending
pub fn generate_transfer_list(record: &BudgetRecord, config: &BudgetConfig) -> Vec<TransferItem> {
    let mut transfers = Vec::with_capacity(
        CanonicalTransfer::ALL.len() + record.one_off_repayments.len() + record.events.len(),
    );

    transfers.extend(CanonicalTransfer::ALL.iter().map(|category| {
        TransferItem::pending(
            category.id(),
            category.description(),
            category.amount(record, config),
        )
    }));

    transfers.extend(record.one_off_repayments.iter().map(|repayment| {
        TransferItem::pending(
            repayment_transfer_id(&repayment.id),
            format!("Credit Card Payment: {}", repayment.name),
            repayment.amount,
        )
    }));

    transfers.extend(record.events.iter().map(|event| {
        TransferItem::pending(event_transfer_id(&event.id), event.name.clone(), event.amount)
    }));

    transfers
}

/// The checklist to show for a record.
///
/// A saved non-empty list wins, completion flags included; otherwise a fresh
/// list is generated.
pub fn checklist(record: &BudgetRecord, config: &BudgetConfig) -> Vec<TransferItem> {
    if record.transfers.is_empty() {
        generate_transfer_list(record, config)
    } else {
        record.transfers.clone()
    }
}

/// Carry completion flags from a saved list onto a freshly generated one.
///
/// The result has exactly the generated items, in generated order, with
/// amounts and descriptions from the generated side. Items are matched by id.
/// Saved items with no generated counterpart (a deleted repayment or event)
/// are dropped.
pub fn reconcile(generated: Vec<TransferItem>, persisted: &[TransferItem]) -> Vec<TransferItem> {
    let completed: HashMap<&str, bool> = persisted
        .iter()
        .map(|item| (item.id.as_str(), item.completed))
        .collect();

    generated
        .into_iter()
        .map(|mut item| {
            if let Some(&done) = completed.get(item.id.as_str()) {
                item.completed = done;
            }
            item
        })
        .collect()
}
