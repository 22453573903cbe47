//! HTTP handler for recording an arrival re-weigh

use axum::{
    extract::{Path, State},
    Json,
};
use shared::{ReceiptInput, ReceiptOutcome};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::{with_conflict_retry, ReceiptService};
use crate::AppState;

/// Record the receipt; the response says whether discrepancies were opened
pub async fn receive_transfer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(transfer_id): Path<Uuid>,
    Json(input): Json<ReceiptInput>,
) -> AppResult<Json<ReceiptOutcome>> {
    check_permission(&current_user.0, "transfers", "receive")?;

    let service = ReceiptService::new(
        state.db.clone(),
        state.events.clone(),
        state.config.transfer.default_tolerance_percent,
    );
    let outcome = with_conflict_retry(state.retry_policy(), || {
        service.receive(transfer_id, input.clone())
    })
    .await?;

    Ok(Json(outcome))
}
