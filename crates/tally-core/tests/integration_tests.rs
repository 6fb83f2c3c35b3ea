//! Integration tests for tally-core
//!
//! These tests exercise the full plan → save → tick off → edit workflow.

use tally_core::{
    checklist, generate_transfer_list, reconcile, BudgetConfig, BudgetMonth, BudgetRecord,
    BudgetSummary, Database, Money, SequentialIds,
};

/// A month with every fixed category filled in, one repayment and two events
fn planned_month(ids: &SequentialIds) -> BudgetRecord {
    let mut record = BudgetRecord::new("2024-05".parse().unwrap())
        .with_repayment("Sofa", Money::from_major(200), ids)
        .with_event("Birthday", Money::from_major(50), ids)
        .with_event("Concert", Money::from_major(80), ids);
    record.aim = "Clear the sofa".into();
    record.wages = Money::from_major(3000);
    record.mortgage = Money::from_major(1000);
    record.bills = Money::from_major(200);
    record.travel = Money::from_major(100);
    record.groceries = Money::from_major(300);
    record.barclaycard = Money::from_major(50);
    record.amount_to_save = Money::from_major(200);
    record
}

/// Mirror of what the server does before persisting
fn prepare(record: BudgetRecord, config: &BudgetConfig) -> BudgetRecord {
    let transfers = reconcile(generate_transfer_list(&record, config), &record.transfers);
    record.with_transfers(transfers)
}

// =============================================================================
// Database Integration Tests
// =============================================================================

#[test]
fn test_full_budget_workflow() {
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let ids = SequentialIds::new("t");
    let config = BudgetConfig::default();

    // Plan the month
    let created = db
        .create_budget(&prepare(planned_month(&ids), &config))
        .expect("Failed to create budget");
    let id = created.id.expect("created budget has an id");
    assert_eq!(created.transfers.len(), 12);

    let summary = BudgetSummary::compute(&created, &config);
    assert_eq!(summary.total_fixed_expenses, Money::from_major(1600));
    assert_eq!(summary.total_credit_card_payments, Money::from_major(250));
    assert_eq!(summary.total_event_spending, Money::from_major(130));
    assert_eq!(summary.initial_remaining_balance, Money::from_major(820));
    assert_eq!(summary.adjustment_needed, Money::from_major(20));
    assert!(summary.is_in_surplus());

    // Tick off the mortgage and the sofa
    let ticked = checklist(&created, &config);
    let ticked = created
        .clone()
        .with_transfers(ticked)
        .with_transfer_completed("mortgage", true)
        .unwrap()
        .with_transfer_completed("repayment-t1", true)
        .unwrap()
        .transfers;
    assert!(db.replace_transfers(id, &ticked).unwrap());

    // Edit: drop the concert, add a holiday, raise groceries
    let saved = db.get_budget(id).unwrap().unwrap();
    let mut edited = saved.without_event("t3").unwrap().with_event(
        "Holiday",
        Money::from_major(300),
        &ids,
    );
    edited.groceries = Money::from_major(350);

    let updated = db
        .update_budget(id, &prepare(edited, &config))
        .unwrap()
        .expect("budget still exists");

    let transfer_ids: Vec<&str> = updated.transfers.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(
        &transfer_ids[9..],
        &["repayment-t1", "event-t2", "event-t4"]
    );
    assert!(updated.transfers[0].completed, "mortgage stays ticked");
    assert!(updated.transfers[9].completed, "sofa stays ticked");
    assert!(!updated.transfers[11].completed, "new event starts pending");
    assert_eq!(updated.transfers[3].amount, Money::from_major(350));

    let summary = BudgetSummary::compute(&updated, &config);
    assert_eq!(summary.adjustment_needed, Money::from_major(-250));
    assert!(!summary.is_in_surplus());

    // Delete
    assert!(db.delete_budget(id).unwrap());
    assert_eq!(db.count_budgets().unwrap(), 0);
}

#[test]
fn test_months_list_independently() {
    let db = Database::in_memory().unwrap();
    let config = BudgetConfig::default();

    for month in ["2024-04", "2024-06", "2024-05"] {
        let mut record = BudgetRecord::new(month.parse().unwrap());
        record.wages = Money::from_major(2500);
        db.create_budget(&prepare(record, &config)).unwrap();
    }

    let budgets = db.list_budgets().unwrap();
    let months: Vec<BudgetMonth> = budgets.iter().map(|b| b.month).collect();
    assert_eq!(
        months,
        vec![
            BudgetMonth::new(2024, 6).unwrap(),
            BudgetMonth::new(2024, 5).unwrap(),
            BudgetMonth::new(2024, 4).unwrap(),
        ]
    );
    assert!(budgets.iter().all(|b| b.transfers.len() == 9));
}

#[test]
fn test_json_round_trip_through_database() {
    let db = Database::in_memory().unwrap();
    let config = BudgetConfig::default();

    let body = r#"{
        "aim": "Keep it tight",
        "month": "2024-07-01T00:00:00.000Z",
        "wages": "2800.50",
        "mortgage": 950,
        "groceries": 275.25,
        "events": [{"id": "e1", "name": "Wedding", "amount": 120}],
        "oneOffRepayments": []
    }"#;
    let record: BudgetRecord = serde_json::from_str(body).unwrap();
    let created = db.create_budget(&prepare(record, &config)).unwrap();

    assert_eq!(created.month.to_string(), "2024-07");
    assert_eq!(created.wages, Money::from_minor(280050));
    assert_eq!(created.groceries, Money::from_minor(27525));

    let json = serde_json::to_value(&created).unwrap();
    assert_eq!(json["wages"], serde_json::json!(2800.5));
    assert_eq!(json["mortgage"], serde_json::json!(950));
    assert_eq!(json["transfers"][9]["id"], "event-e1");
    assert_eq!(json["transfers"][9]["description"], "Wedding");
}
