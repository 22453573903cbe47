//! HTTP handlers for dispatch endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use shared::{Shipment, ShipmentInput, TransferStatus};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{with_conflict_retry, ShipmentService};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub shipment: Shipment,
    pub transfer_status: TransferStatus,
}

/// Record a shipment leaving the sending branch
pub async fn dispatch_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<ShipmentInput>,
) -> AppResult<(StatusCode, Json<DispatchResponse>)> {
    check_permission(&current_user.0, "transfers", "dispatch")?;

    let service = ShipmentService::new(state.db.clone(), state.events.clone());
    let (shipment, transfer_status) = with_conflict_retry(state.retry_policy(), || {
        service.dispatch(transfer_id, input.clone())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(DispatchResponse {
            shipment,
            transfer_status,
        }),
    ))
}

/// Shipments recorded for a transfer
pub async fn list_shipments(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
) -> AppResult<Json<Vec<Shipment>>> {
    let service = ShipmentService::new(state.db.clone(), state.events.clone());
    let shipments = service.list_shipments(transfer_id).await?;
    Ok(Json(shipments))
}
