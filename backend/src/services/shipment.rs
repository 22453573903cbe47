//! Dispatch recording

use std::sync::Arc;

use chrono::Utc;
use shared::{Shipment, ShipmentInput, TransferStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::events::EventSink;
use crate::services::transfer_store::TransferStore;

#[derive(Clone)]
pub struct ShipmentService {
    store: TransferStore,
}

impl ShipmentService {
    pub fn new(db: PgPool, events: Arc<dyn EventSink>) -> Self {
        Self {
            store: TransferStore::new(db, events),
        }
    }

    /// Record a (possibly partial) shipment against an approved transfer
    pub async fn dispatch(
        &self,
        transfer_id: Uuid,
        input: ShipmentInput,
    ) -> AppResult<(Shipment, TransferStatus)> {
        let (shipment, aggregate) = self
            .store
            .mutate(transfer_id, |agg| agg.dispatch(input, Utc::now()))
            .await?;

        tracing::info!(
            %transfer_id,
            shipment_id = %shipment.id,
            net_weight_kg = %shipment.net_weight_kg,
            shipments = aggregate.shipments.len(),
            to_status = %aggregate.status(),
            "Shipment dispatched"
        );
        Ok((shipment, aggregate.status()))
    }

    /// Shipments of a transfer in dispatch order
    pub async fn list_shipments(&self, transfer_id: Uuid) -> AppResult<Vec<Shipment>> {
        Ok(self.store.get(transfer_id).await?.shipments)
    }
}
