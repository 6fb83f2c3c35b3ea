//! Budget record operations
//!
//! A record's events, repayments and transfers are always written as a whole:
//! updates delete the existing rows and insert the new ones inside the same
//! transaction as the parent row.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use super::{in_transaction, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{BudgetRecord, Event, Repayment, TransferItem};

const BUDGET_COLUMNS: &str = "id, aim, month, wages, mortgage, bills, travel, groceries, \
     barclaycard, monzo_flex, amex, amount_to_save, previous_month_reflection, \
     upcoming_calendar_notes, created_at, updated_at";

/// Map a `budgets` row (selected with BUDGET_COLUMNS) to a record without children
fn row_to_budget(row: &Row) -> rusqlite::Result<BudgetRecord> {
    let created_at: Option<String> = row.get(14)?;
    let updated_at: Option<String> = row.get(15)?;

    let mut record = BudgetRecord::new(row.get(2)?);
    record.id = Some(row.get(0)?);
    record.aim = row.get(1)?;
    record.wages = row.get(3)?;
    record.mortgage = row.get(4)?;
    record.bills = row.get(5)?;
    record.travel = row.get(6)?;
    record.groceries = row.get(7)?;
    record.barclaycard = row.get(8)?;
    record.monzo_flex = row.get(9)?;
    record.amex = row.get(10)?;
    record.amount_to_save = row.get(11)?;
    record.previous_month_reflection = row.get(12)?;
    record.upcoming_calendar_notes = row.get(13)?;
    record.created_at = created_at.as_deref().map(parse_datetime);
    record.updated_at = updated_at.as_deref().map(parse_datetime);
    Ok(record)
}

/// Fill in events, repayments and transfers for a record loaded from `budgets`
fn load_children(conn: &Connection, record: &mut BudgetRecord) -> Result<()> {
    let Some(budget_id) = record.id else {
        return Ok(());
    };

    let mut stmt = conn.prepare(
        "SELECT event_key, name, amount FROM budget_events WHERE budget_id = ? ORDER BY position",
    )?;
    record.events = stmt
        .query_map(params![budget_id], |row| {
            Ok(Event {
                id: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT repayment_key, name, amount FROM budget_repayments WHERE budget_id = ? ORDER BY position",
    )?;
    record.one_off_repayments = stmt
        .query_map(params![budget_id], |row| {
            Ok(Repayment {
                id: row.get(0)?,
                name: row.get(1)?,
                amount: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    record.transfers = load_transfers(conn, budget_id)?;

    Ok(())
}

fn load_transfers(conn: &Connection, budget_id: i64) -> Result<Vec<TransferItem>> {
    let mut stmt = conn.prepare(
        "SELECT item_key, description, amount, completed FROM budget_transfers WHERE budget_id = ? ORDER BY position",
    )?;
    let transfers = stmt
        .query_map(params![budget_id], |row| {
            Ok(TransferItem {
                id: row.get(0)?,
                description: row.get(1)?,
                amount: row.get(2)?,
                completed: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(transfers)
}

fn insert_transfers(conn: &Connection, budget_id: i64, transfers: &[TransferItem]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO budget_transfers (budget_id, position, item_key, description, amount, completed) VALUES (?, ?, ?, ?, ?, ?)",
    )?;
    for (position, item) in transfers.iter().enumerate() {
        stmt.execute(params![
            budget_id,
            position as i64,
            item.id,
            item.description,
            item.amount,
            item.completed
        ])?;
    }
    Ok(())
}

fn insert_children(conn: &Connection, budget_id: i64, record: &BudgetRecord) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO budget_events (budget_id, position, event_key, name, amount) VALUES (?, ?, ?, ?, ?)",
    )?;
    for (position, event) in record.events.iter().enumerate() {
        stmt.execute(params![
            budget_id,
            position as i64,
            event.id,
            event.name,
            event.amount
        ])?;
    }

    let mut stmt = conn.prepare(
        "INSERT INTO budget_repayments (budget_id, position, repayment_key, name, amount) VALUES (?, ?, ?, ?, ?)",
    )?;
    for (position, repayment) in record.one_off_repayments.iter().enumerate() {
        stmt.execute(params![
            budget_id,
            position as i64,
            repayment.id,
            repayment.name,
            repayment.amount
        ])?;
    }

    insert_transfers(conn, budget_id, &record.transfers)
}

fn delete_children(conn: &Connection, budget_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM budget_events WHERE budget_id = ?",
        params![budget_id],
    )?;
    conn.execute(
        "DELETE FROM budget_repayments WHERE budget_id = ?",
        params![budget_id],
    )?;
    conn.execute(
        "DELETE FROM budget_transfers WHERE budget_id = ?",
        params![budget_id],
    )?;
    Ok(())
}

fn fetch_budget(conn: &Connection, id: i64) -> Result<Option<BudgetRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM budgets WHERE id = ?", BUDGET_COLUMNS),
            params![id],
            row_to_budget,
        )
        .optional()?;

    match record {
        Some(mut record) => {
            load_children(conn, &mut record)?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

impl Database {
    /// Insert a record with all its nested collections.
    ///
    /// Any `id` on the input is ignored; the stored record is returned.
    pub fn create_budget(&self, record: &BudgetRecord) -> Result<BudgetRecord> {
        let conn = self.conn()?;

        let created = in_transaction(&conn, |conn| {
            conn.execute(
                r#"
                INSERT INTO budgets (
                    aim, month, wages, mortgage, bills, travel, groceries,
                    barclaycard, monzo_flex, amex, amount_to_save,
                    previous_month_reflection, upcoming_calendar_notes
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
                params![
                    record.aim,
                    record.month,
                    record.wages,
                    record.mortgage,
                    record.bills,
                    record.travel,
                    record.groceries,
                    record.barclaycard,
                    record.monzo_flex,
                    record.amex,
                    record.amount_to_save,
                    record.previous_month_reflection,
                    record.upcoming_calendar_notes,
                ],
            )?;
            let id = conn.last_insert_rowid();
            insert_children(conn, id, record)?;

            fetch_budget(conn, id)?
                .ok_or_else(|| Error::NotFound(format!("Budget {} not found after creation", id)))
        })?;

        info!(
            budget_id = ?created.id,
            month = %created.month,
            events = created.events.len(),
            repayments = created.one_off_repayments.len(),
            "Created budget"
        );
        Ok(created)
    }

    /// Get a record with its nested collections
    pub fn get_budget(&self, id: i64) -> Result<Option<BudgetRecord>> {
        let conn = self.conn()?;
        fetch_budget(&conn, id)
    }

    /// List all records, newest month first
    pub fn list_budgets(&self) -> Result<Vec<BudgetRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM budgets ORDER BY month DESC, id DESC",
            BUDGET_COLUMNS
        ))?;

        let mut budgets = stmt
            .query_map([], row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for record in &mut budgets {
            load_children(&conn, record)?;
        }

        debug!(count = budgets.len(), "Listed budgets");
        Ok(budgets)
    }

    /// Replace a record's fields and nested collections.
    ///
    /// Returns `None` if no record has this id.
    pub fn update_budget(&self, id: i64, record: &BudgetRecord) -> Result<Option<BudgetRecord>> {
        let conn = self.conn()?;

        let updated = in_transaction(&conn, |conn| {
            let changed = conn.execute(
                r#"
                UPDATE budgets SET
                    aim = ?, month = ?, wages = ?, mortgage = ?, bills = ?, travel = ?,
                    groceries = ?, barclaycard = ?, monzo_flex = ?, amex = ?,
                    amount_to_save = ?, previous_month_reflection = ?,
                    upcoming_calendar_notes = ?, updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                "#,
                params![
                    record.aim,
                    record.month,
                    record.wages,
                    record.mortgage,
                    record.bills,
                    record.travel,
                    record.groceries,
                    record.barclaycard,
                    record.monzo_flex,
                    record.amex,
                    record.amount_to_save,
                    record.previous_month_reflection,
                    record.upcoming_calendar_notes,
                    id,
                ],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            delete_children(conn, id)?;
            insert_children(conn, id, record)?;
            fetch_budget(conn, id)
        })?;

        if updated.is_some() {
            info!(budget_id = id, month = %record.month, "Updated budget");
        }
        Ok(updated)
    }

    /// Replace only the transfer checklist of a record.
    ///
    /// Returns false if no record has this id.
    pub fn replace_transfers(&self, budget_id: i64, transfers: &[TransferItem]) -> Result<bool> {
        let conn = self.conn()?;

        in_transaction(&conn, |conn| {
            let changed = conn.execute(
                "UPDATE budgets SET updated_at = CURRENT_TIMESTAMP WHERE id = ?",
                params![budget_id],
            )?;
            if changed == 0 {
                return Ok(false);
            }
            conn.execute(
                "DELETE FROM budget_transfers WHERE budget_id = ?",
                params![budget_id],
            )?;
            insert_transfers(conn, budget_id, transfers)?;
            Ok(true)
        })
    }

    /// Delete a record and everything it owns. Returns false if it did not exist.
    pub fn delete_budget(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;

        let deleted = in_transaction(&conn, |conn| {
            delete_children(conn, id)?;
            let changed = conn.execute("DELETE FROM budgets WHERE id = ?", params![id])?;
            Ok(changed > 0)
        })?;

        if deleted {
            info!(budget_id = id, "Deleted budget");
        }
        Ok(deleted)
    }

    pub fn count_budgets(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM budgets", [], |row| row.get(0))?;
        Ok(count)
    }
}
