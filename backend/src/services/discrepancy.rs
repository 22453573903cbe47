//! Discrepancy review and resolution
//!
//! Resolution writes the discrepancy, the parent transfer status and the stock
//! effects in one transaction. Stock effects are keyed by discrepancy line, so
//! a replayed resolution never moves stock twice.

use std::sync::Arc;

use chrono::Utc;
use shared::{Discrepancy, Disposition, NewDiscrepancy, Resolution, TransferError};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::events::EventSink;
use crate::services::stock::StockService;
use crate::services::transfer_store::{self, TransferStore};

#[derive(Clone)]
pub struct DiscrepancyService {
    store: TransferStore,
    stock: Arc<dyn StockService>,
}

impl DiscrepancyService {
    pub fn new(db: PgPool, events: Arc<dyn EventSink>, stock: Arc<dyn StockService>) -> Self {
        Self {
            store: TransferStore::new(db, events),
            stock,
        }
    }

    /// Manually raise a discrepancy on a delivered transfer
    pub async fn raise(&self, transfer_id: Uuid, input: NewDiscrepancy) -> AppResult<Discrepancy> {
        let (discrepancy, aggregate) = self
            .store
            .mutate(transfer_id, |agg| agg.raise_discrepancy(input, Utc::now()))
            .await?;

        tracing::info!(
            %transfer_id,
            discrepancy_id = %discrepancy.id,
            reason = discrepancy.reason_category.as_str(),
            to_status = %aggregate.status(),
            "Discrepancy raised"
        );
        Ok(discrepancy)
    }

    pub async fn get(&self, discrepancy_id: Uuid) -> AppResult<Discrepancy> {
        let transfer_id = self.transfer_of(discrepancy_id).await?;
        let aggregate = self.store.get(transfer_id).await?;
        aggregate
            .discrepancy(discrepancy_id)
            .cloned()
            .ok_or_else(|| not_found(discrepancy_id).into())
    }

    /// `open | reopened -> under_review`
    pub async fn start_review(&self, discrepancy_id: Uuid) -> AppResult<Discrepancy> {
        let transfer_id = self.transfer_of(discrepancy_id).await?;
        let (discrepancy, _) = self
            .store
            .mutate(transfer_id, |agg| agg.start_review(discrepancy_id, Utc::now()))
            .await?;

        tracing::info!(%transfer_id, %discrepancy_id, "Discrepancy under review");
        Ok(discrepancy)
    }

    /// `under_review -> reopened`
    pub async fn reopen(&self, discrepancy_id: Uuid, notes: Option<String>) -> AppResult<Discrepancy> {
        let transfer_id = self.transfer_of(discrepancy_id).await?;
        let (discrepancy, _) = self
            .store
            .mutate(transfer_id, |agg| agg.reopen(discrepancy_id, notes, Utc::now()))
            .await?;

        tracing::info!(%transfer_id, %discrepancy_id, "Discrepancy reopened");
        Ok(discrepancy)
    }

    /// Apply a disposition, move stock and re-derive the transfer status
    pub async fn resolve(
        &self,
        discrepancy_id: Uuid,
        disposition: Disposition,
        notes: Option<String>,
        resolved_by: Uuid,
    ) -> AppResult<Resolution> {
        let transfer_id = self.transfer_of(discrepancy_id).await?;

        let mut tx = self.store.begin().await?;
        let mut aggregate = transfer_store::lock(&mut tx, transfer_id).await?;
        let before = aggregate.clone();

        let resolution = match aggregate.resolve(discrepancy_id, disposition, notes, Utc::now()) {
            Ok(resolution) => resolution,
            Err(err) => {
                if aggregate != before {
                    transfer_store::save(&mut tx, &mut aggregate).await?;
                    self.store.commit(tx, &mut aggregate).await?;
                    tracing::warn!(%transfer_id, %discrepancy_id, error = %err, "Resolution rejected, discrepancy reopened");
                }
                return Err(err.into());
            }
        };

        transfer_store::save(&mut tx, &mut aggregate).await?;
        for effect in &resolution.effects {
            self.stock.apply(&mut tx, effect).await?;
        }
        sqlx::query("UPDATE discrepancies SET resolved_by = $2 WHERE id = $1")
            .bind(discrepancy_id)
            .bind(resolved_by)
            .execute(&mut *tx)
            .await?;
        self.store.commit(tx, &mut aggregate).await?;

        tracing::info!(
            %transfer_id,
            %discrepancy_id,
            disposition = disposition.as_str(),
            stock_effects = resolution.effects.len(),
            to_status = %resolution.transfer_status,
            "Discrepancy resolved"
        );
        Ok(resolution)
    }

    async fn transfer_of(&self, discrepancy_id: Uuid) -> AppResult<Uuid> {
        let transfer_id: Option<Uuid> =
            sqlx::query_scalar("SELECT transfer_id FROM discrepancies WHERE id = $1")
                .bind(discrepancy_id)
                .fetch_optional(self.store.db())
                .await?;
        transfer_id.ok_or_else(|| not_found(discrepancy_id).into())
    }
}

fn not_found(discrepancy_id: Uuid) -> TransferError {
    TransferError::NotFound {
        entity: "discrepancy",
        id: discrepancy_id,
    }
}
