//! HTTP handlers for discrepancy endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{Discrepancy, Disposition, NewDiscrepancy, Resolution};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{with_conflict_retry, DiscrepancyService};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ReopenRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub disposition: Disposition,
    pub notes: Option<String>,
}

fn discrepancy_service(state: &AppState) -> DiscrepancyService {
    DiscrepancyService::new(state.db.clone(), state.events.clone(), state.stock.clone())
}

/// Manually raise a discrepancy on a delivered transfer
pub async fn raise_discrepancy(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<NewDiscrepancy>,
) -> AppResult<(StatusCode, Json<Discrepancy>)> {
    check_permission(&current_user.0, "transfers", "receive")?;

    let service = discrepancy_service(&state);
    let discrepancy = with_conflict_retry(state.retry_policy(), || {
        service.raise(transfer_id, input.clone())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(discrepancy)))
}

/// Get one discrepancy with its lines
pub async fn get_discrepancy(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(discrepancy_id): Path<Uuid>,
) -> AppResult<Json<Discrepancy>> {
    let discrepancy = discrepancy_service(&state).get(discrepancy_id).await?;
    Ok(Json(discrepancy))
}

/// Take a discrepancy into review
pub async fn start_review(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(discrepancy_id): Path<Uuid>,
) -> AppResult<Json<Discrepancy>> {
    check_permission(&current_user.0, "discrepancies", "resolve")?;

    let service = discrepancy_service(&state);
    let discrepancy =
        with_conflict_retry(state.retry_policy(), || service.start_review(discrepancy_id)).await?;
    Ok(Json(discrepancy))
}

/// Send a discrepancy back after a failed review
pub async fn reopen_discrepancy(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(discrepancy_id): Path<Uuid>,
    input: Option<Json<ReopenRequest>>,
) -> AppResult<Json<Discrepancy>> {
    check_permission(&current_user.0, "discrepancies", "resolve")?;

    // Body is optional
    let notes = input.and_then(|Json(body)| body.notes);
    let service = discrepancy_service(&state);
    let discrepancy = with_conflict_retry(state.retry_policy(), || {
        service.reopen(discrepancy_id, notes.clone())
    })
    .await?;
    Ok(Json(discrepancy))
}

/// Resolve with a disposition; adjusts or writes off stock
pub async fn resolve_discrepancy(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(discrepancy_id): Path<Uuid>,
    Json(input): Json<ResolveRequest>,
) -> AppResult<Json<Resolution>> {
    check_permission(&current_user.0, "discrepancies", "resolve")?;

    let service = discrepancy_service(&state);
    let user_id = current_user.0.user_id;
    let resolution = with_conflict_retry(state.retry_policy(), || {
        service.resolve(discrepancy_id, input.disposition, input.notes.clone(), user_id)
    })
    .await?;
    Ok(Json(resolution))
}
