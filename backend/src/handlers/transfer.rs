//! HTTP handlers for transfer lifecycle endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{NewTransfer, PaginatedResponse, Transfer, TransferAggregate};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{with_conflict_retry, TransferFilter, TransferService};
use crate::AppState;

fn transfer_service(state: &AppState) -> TransferService {
    TransferService::new(
        state.db.clone(),
        state.events.clone(),
        state.sequence.clone(),
        &state.config.sequence,
    )
}

/// Create a draft transfer
pub async fn create_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<NewTransfer>,
) -> AppResult<(StatusCode, Json<TransferAggregate>)> {
    check_permission(&current_user.0, "transfers", "create")?;

    let transfer = transfer_service(&state)
        .create_transfer(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

/// List transfers, optionally by branch and status
pub async fn list_transfers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(filter): Query<TransferFilter>,
) -> AppResult<Json<PaginatedResponse<Transfer>>> {
    let page = transfer_service(&state).list_transfers(filter).await?;
    Ok(Json(page))
}

/// Get a transfer with all of its shipments, receipts and discrepancies
pub async fn get_transfer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferAggregate>> {
    let transfer = transfer_service(&state).get_transfer(transfer_id).await?;
    Ok(Json(transfer))
}

/// Approve a draft transfer
pub async fn approve_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferAggregate>> {
    check_permission(&current_user.0, "transfers", "approve")?;

    let service = transfer_service(&state);
    let transfer = with_conflict_retry(state.retry_policy(), || service.approve(transfer_id)).await?;
    Ok(Json(transfer))
}

/// Mark an in-transit transfer as arrived at the receiving branch
pub async fn mark_reached(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<TransferAggregate>> {
    check_permission(&current_user.0, "transfers", "receive")?;

    let service = transfer_service(&state);
    let transfer =
        with_conflict_retry(state.retry_policy(), || service.mark_reached(transfer_id)).await?;
    Ok(Json(transfer))
}
