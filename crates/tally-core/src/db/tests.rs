//! Database tests

use super::*;
use crate::ids::SequentialIds;
use crate::models::*;
use crate::transfers::generate_transfer_list;
use crate::BudgetConfig;

#[cfg(test)]
mod tests {
    use super::*;

    fn may() -> BudgetMonth {
        BudgetMonth::new(2024, 5).unwrap()
    }

    fn sample_record() -> BudgetRecord {
        let ids = SequentialIds::new("id-");
        let mut record = BudgetRecord::new(may())
            .with_repayment("Sofa", Money::from_major(200), &ids)
            .with_event("Birthday", Money::from_major(50), &ids)
            .with_event("Concert", Money::from_minor(4550), &ids);
        record.aim = "Save for holiday".into();
        record.wages = Money::from_major(3000);
        record.mortgage = Money::from_major(1000);
        record.monzo_flex = Money::from_major(25);
        record.amount_to_save = Money::from_major(200);
        record.previous_month_reflection = "Too many takeaways".into();
        record.upcoming_calendar_notes = "Wedding on the 12th".into();
        let transfers = generate_transfer_list(&record, &BudgetConfig::default());
        record.with_transfers(transfers)
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_budgets().unwrap().is_empty());
        assert_eq!(db.count_budgets().unwrap(), 0);
        assert!(!db.is_encrypted());
    }

    #[test]
    fn test_schema_exists() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();

        for table in [
            "budgets",
            "budget_events",
            "budget_repayments",
            "budget_transfers",
            "audit_log",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "table {} should exist", table);
        }
    }

    #[test]
    fn test_create_and_get_budget() {
        let db = Database::in_memory().unwrap();
        let record = sample_record();

        let created = db.create_budget(&record).unwrap();
        let id = created.id.expect("created record has an id");
        assert!(created.created_at.is_some());

        let fetched = db.get_budget(id).unwrap().unwrap();
        assert_eq!(fetched.aim, "Save for holiday");
        assert_eq!(fetched.month, may());
        assert_eq!(fetched.wages, Money::from_major(3000));
        assert_eq!(fetched.monzo_flex, Money::from_major(25));
        assert_eq!(fetched.previous_month_reflection, "Too many takeaways");
        assert_eq!(fetched.upcoming_calendar_notes, "Wedding on the 12th");

        // Nested collections keep ids, amounts and order
        assert_eq!(fetched.events, record.events);
        assert_eq!(fetched.one_off_repayments, record.one_off_repayments);
        assert_eq!(fetched.transfers, record.transfers);
        assert_eq!(fetched.events[1].amount, Money::from_minor(4550));
        assert_eq!(fetched.transfers[9].id, "repayment-id-1");
    }

    #[test]
    fn test_get_missing_budget() {
        let db = Database::in_memory().unwrap();
        assert!(db.get_budget(999).unwrap().is_none());
    }

    #[test]
    fn test_list_budgets_newest_month_first() {
        let db = Database::in_memory().unwrap();

        for (year, month) in [(2024, 3), (2024, 11), (2023, 12)] {
            let mut record = BudgetRecord::new(BudgetMonth::new(year, month).unwrap());
            record.aim = format!("{}-{}", year, month);
            db.create_budget(&record).unwrap();
        }

        let months: Vec<String> = db
            .list_budgets()
            .unwrap()
            .iter()
            .map(|b| b.month.to_string())
            .collect();
        assert_eq!(months, vec!["2024-11", "2024-03", "2023-12"]);
        assert_eq!(db.count_budgets().unwrap(), 3);
    }

    #[test]
    fn test_update_replaces_nested_collections() {
        let db = Database::in_memory().unwrap();
        let created = db.create_budget(&sample_record()).unwrap();
        let id = created.id.unwrap();

        let mut edited = created
            .clone()
            .without_event("id-2")
            .unwrap()
            .with_transfer_completed("mortgage", true)
            .unwrap();
        edited.wages = Money::from_major(3100);
        edited.one_off_repayments.clear();

        let updated = db.update_budget(id, &edited).unwrap().unwrap();
        assert_eq!(updated.id, Some(id));
        assert_eq!(updated.wages, Money::from_major(3100));
        assert_eq!(updated.events.len(), 1);
        assert_eq!(updated.events[0].name, "Concert");
        assert!(updated.one_off_repayments.is_empty());
        assert!(updated.transfers[0].completed);

        // No stray child rows left behind
        let conn = db.conn().unwrap();
        let events: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM budget_events WHERE budget_id = ?",
                [id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(events, 1);
    }

    #[test]
    fn test_update_missing_budget() {
        let db = Database::in_memory().unwrap();
        assert!(db.update_budget(42, &sample_record()).unwrap().is_none());
    }

    #[test]
    fn test_replace_transfers() {
        let db = Database::in_memory().unwrap();
        let created = db.create_budget(&sample_record()).unwrap();
        let id = created.id.unwrap();

        let toggled = created
            .with_transfer_completed("event-id-3", true)
            .unwrap()
            .transfers;
        assert!(db.replace_transfers(id, &toggled).unwrap());

        let fetched = db.get_budget(id).unwrap().unwrap();
        let concert = fetched
            .transfers
            .iter()
            .find(|t| t.id == "event-id-3")
            .unwrap();
        assert!(concert.completed);
        assert_eq!(fetched.transfers.len(), 12);

        assert!(!db.replace_transfers(999, &toggled).unwrap());
    }

    #[test]
    fn test_delete_budget_cascades() {
        let db = Database::in_memory().unwrap();
        let created = db.create_budget(&sample_record()).unwrap();
        let id = created.id.unwrap();

        assert!(db.delete_budget(id).unwrap());
        assert!(db.get_budget(id).unwrap().is_none());
        assert!(!db.delete_budget(id).unwrap());

        let conn = db.conn().unwrap();
        for table in ["budget_events", "budget_repayments", "budget_transfers"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .unwrap();
            assert_eq!(count, 0, "{} should be empty", table);
        }
    }

    #[test]
    fn test_money_stored_as_minor_units() {
        let db = Database::in_memory().unwrap();
        let mut record = BudgetRecord::new(may());
        record.groceries = Money::from_minor(30099);
        let id = db.create_budget(&record).unwrap().id.unwrap();

        let conn = db.conn().unwrap();
        let raw: i64 = conn
            .query_row("SELECT groceries FROM budgets WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(raw, 30099);

        let month: String = conn
            .query_row("SELECT month FROM budgets WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(month, "2024-05");
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("alice@example.com", "create", Some("budget"), Some(1), None)
            .unwrap();
        db.log_audit("alice@example.com", "delete", Some("budget"), Some(1), Some("month=2024-05"))
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "delete");
        assert_eq!(entries[0].details.as_deref(), Some("month=2024-05"));
        assert_eq!(entries[1].user_email, "alice@example.com");

        assert_eq!(db.list_audit_log(1).unwrap().len(), 1);
    }

    #[test]
    fn test_encrypted_database_requires_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.db");
        let path = path.to_str().unwrap();

        let db = Database::new_with_key(path, Some("correct horse")).unwrap();
        assert!(db.is_encrypted());
        db.create_budget(&BudgetRecord::new(may())).unwrap();
        drop(db);

        let reopened = Database::new_with_key(path, Some("correct horse")).unwrap();
        assert_eq!(reopened.count_budgets().unwrap(), 1);

        assert!(Database::new_with_key(path, Some("wrong")).is_err());
    }
}
