//! Arrival re-weigh and tolerance decision

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{ReceiptInput, ReceiptOutcome};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::events::EventSink;
use crate::services::transfer_store::TransferStore;

#[derive(Clone)]
pub struct ReceiptService {
    store: TransferStore,
    default_tolerance_percent: Decimal,
}

impl ReceiptService {
    pub fn new(db: PgPool, events: Arc<dyn EventSink>, default_tolerance_percent: Decimal) -> Self {
        Self {
            store: TransferStore::new(db, events),
            default_tolerance_percent,
        }
    }

    /// Record the receipt; completes the transfer or opens discrepancies
    pub async fn receive(&self, transfer_id: Uuid, input: ReceiptInput) -> AppResult<ReceiptOutcome> {
        let tolerance = self.default_tolerance_percent;
        let (outcome, _) = self
            .store
            .mutate(transfer_id, |agg| agg.receive(input, tolerance, Utc::now()))
            .await?;

        if outcome.is_clean() {
            tracing::info!(
                %transfer_id,
                received_net_kg = %outcome.receipt.reweigh_net_kg,
                shipped_net_kg = %outcome.receipt.shipped_net_kg,
                "Transfer received within tolerance"
            );
        } else {
            tracing::info!(
                %transfer_id,
                received_net_kg = %outcome.receipt.reweigh_net_kg,
                shipped_net_kg = %outcome.receipt.shipped_net_kg,
                variance_ratio = ?outcome.receipt.variance_ratio,
                discrepancies = outcome.discrepancies.len(),
                "Transfer received with discrepancies"
            );
        }
        Ok(outcome)
    }
}
