//! Budget record handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{AppError, AppState, Session, SuccessResponse, MAX_BODY_SIZE};
use tally_core::{
    checklist, generate_transfer_list, reconcile, BudgetRecord, BudgetSummary, TransferItem,
};

/// A record with its computed summary and the checklist to display
#[derive(Debug, Serialize)]
pub struct BudgetDetails {
    pub budget: BudgetRecord,
    pub summary: BudgetSummary,
    pub transfers: Vec<TransferItem>,
}

/// Summary and checklist for a record that has not been saved
#[derive(Debug, Serialize)]
pub struct BudgetPreview {
    pub summary: BudgetSummary,
    pub transfers: Vec<TransferItem>,
}

/// Query parameters for DELETE /api/budget
#[derive(Debug, Deserialize)]
pub struct DeleteBudgetQuery {
    pub id: Option<String>,
}

/// Request body for toggling one checklist item
#[derive(Debug, Deserialize)]
pub struct TransferCompletedRequest {
    pub completed: bool,
}

async fn read_json<T: serde::de::DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Fill in missing ids, rebuild the checklist from the record's fields, then validate
///
/// Completion flags on the incoming `transfers` carry over by item id.
fn prepare_record(state: &AppState, record: BudgetRecord) -> Result<BudgetRecord, AppError> {
    let record = record.with_assigned_ids(state.ids.as_ref());
    let generated = generate_transfer_list(&record, &state.config.budget);
    let transfers = reconcile(generated, &record.transfers);
    let record = record.with_transfers(transfers);
    record.validate().map_err(AppError::from_core)?;
    Ok(record)
}

fn budget_not_found() -> AppError {
    AppError::not_found("Budget not found")
}

/// GET /api/budget - List all budgets with their nested collections
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<BudgetRecord>>, AppError> {
    let budgets = state.db.list_budgets()?;

    // Audit log - read access
    state.db.log_audit(
        &session.user,
        "list",
        Some("budget"),
        None,
        Some(&format!("count={}", budgets.len())),
    )?;

    Ok(Json(budgets))
}

/// GET /api/budget/:id - Get a single budget
pub async fn get_budget(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<BudgetRecord>, AppError> {
    let budget = state.db.get_budget(id)?.ok_or_else(budget_not_found)?;

    state
        .db
        .log_audit(&session.user, "get", Some("budget"), Some(id), None)?;

    Ok(Json(budget))
}

/// GET /api/budget/:id/summary - A budget with its totals and checklist
pub async fn get_budget_summary(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<i64>,
) -> Result<Json<BudgetDetails>, AppError> {
    let budget = state.db.get_budget(id)?.ok_or_else(budget_not_found)?;

    let summary = BudgetSummary::compute(&budget, &state.config.budget);
    let transfers = checklist(&budget, &state.config.budget);

    state
        .db
        .log_audit(&session.user, "summary", Some("budget"), Some(id), None)?;

    Ok(Json(BudgetDetails {
        budget,
        summary,
        transfers,
    }))
}

/// POST /api/budget - Create a budget
pub async fn create_budget(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    request: Request,
) -> Result<Json<BudgetRecord>, AppError> {
    let mut record: BudgetRecord = read_json(request).await?;
    record.id = None;

    let record = prepare_record(&state, record)?;
    let created = state.db.create_budget(&record)?;

    state.db.log_audit(
        &session.user,
        "create",
        Some("budget"),
        created.id,
        Some(&format!("month={}", created.month)),
    )?;

    Ok(Json(created))
}

/// PUT /api/budget - Replace a budget identified by the `id` in the body
pub async fn update_budget(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    request: Request,
) -> Result<Json<BudgetRecord>, AppError> {
    let mut record: BudgetRecord = read_json(request).await?;
    let id = record
        .id
        .ok_or_else(|| AppError::bad_request("Budget id is required"))?;

    let existing = state.db.get_budget(id)?.ok_or_else(budget_not_found)?;

    // A body without a checklist keeps the saved completion flags
    if record.transfers.is_empty() {
        record.transfers = existing.transfers;
    }

    let record = prepare_record(&state, record)?;
    let updated = state
        .db
        .update_budget(id, &record)?
        .ok_or_else(budget_not_found)?;

    state.db.log_audit(
        &session.user,
        "update",
        Some("budget"),
        Some(id),
        Some(&format!("month={}", updated.month)),
    )?;

    Ok(Json(updated))
}

/// DELETE /api/budget?id=<id> - Delete a budget and everything it owns
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<DeleteBudgetQuery>,
) -> Result<Json<SuccessResponse>, AppError> {
    let raw_id = params
        .id
        .ok_or_else(|| AppError::bad_request("Budget id is required"))?;
    let id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| AppError::bad_request("Invalid budget id"))?;

    if !state.db.delete_budget(id)? {
        return Err(budget_not_found());
    }

    state
        .db
        .log_audit(&session.user, "delete", Some("budget"), Some(id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// PATCH /api/budget/:id/transfers/:item - Tick or untick one checklist item
pub async fn set_transfer_completed(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path((id, item)): Path<(i64, String)>,
    request: Request,
) -> Result<Json<BudgetRecord>, AppError> {
    let req: TransferCompletedRequest = read_json(request).await?;

    let budget = state.db.get_budget(id)?.ok_or_else(budget_not_found)?;
    let transfers = checklist(&budget, &state.config.budget);
    let toggled = budget
        .with_transfers(transfers)
        .with_transfer_completed(&item, req.completed)
        .map_err(AppError::from_core)?;

    if !state.db.replace_transfers(id, &toggled.transfers)? {
        return Err(budget_not_found());
    }
    debug!(budget_id = id, item = %item, completed = req.completed, "Transfer toggled");

    state.db.log_audit(
        &session.user,
        "update",
        Some("transfer"),
        Some(id),
        Some(&format!("item={}, completed={}", item, req.completed)),
    )?;

    let updated = state.db.get_budget(id)?.ok_or_else(budget_not_found)?;
    Ok(Json(updated))
}

/// POST /api/budget/preview - Summary and checklist for an unsaved budget
pub async fn preview_budget(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<BudgetPreview>, AppError> {
    let record: BudgetRecord = read_json(request).await?;
    let record = prepare_record(&state, record)?;

    Ok(Json(BudgetPreview {
        summary: BudgetSummary::compute(&record, &state.config.budget),
        transfers: record.transfers,
    }))
}
