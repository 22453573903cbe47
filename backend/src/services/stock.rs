//! Branch on-hand stock
//!
//! Every mutation carries an idempotency key. The first application is
//! recorded in a ledger; replays with the same key change nothing. Mutations
//! run on the caller's connection so they commit or roll back together with
//! the discrepancy resolution that produced them.

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{StockDelta, StockEffect, StockLevel};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppResult;

#[async_trait]
pub trait StockService: Send + Sync {
    /// Add `delta` (negative for a shortage) to on-hand stock.
    /// Returns false when `key` was already applied.
    async fn adjust_stock(
        &self,
        conn: &mut PgConnection,
        key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        delta: StockDelta,
    ) -> AppResult<bool>;

    /// Record a written-off amount for accounting. On-hand stock is untouched.
    async fn record_loss(
        &self,
        conn: &mut PgConnection,
        key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        amount: StockDelta,
    ) -> AppResult<bool>;

    async fn on_hand(&self, branch_id: Uuid, product_id: Uuid) -> AppResult<StockLevel>;

    async fn apply(&self, conn: &mut PgConnection, effect: &StockEffect) -> AppResult<bool> {
        match *effect {
            StockEffect::Adjust {
                idempotency_key,
                branch_id,
                product_id,
                delta,
            } => {
                self.adjust_stock(conn, idempotency_key, branch_id, product_id, delta)
                    .await
            }
            StockEffect::Loss {
                idempotency_key,
                branch_id,
                product_id,
                amount,
            } => {
                self.record_loss(conn, idempotency_key, branch_id, product_id, amount)
                    .await
            }
        }
    }
}

#[derive(Debug, FromRow)]
struct StockLevelRow {
    on_hand_qty: Decimal,
    on_hand_weight_kg: Decimal,
}

/// Stock service backed by `branch_stock` and its ledgers
#[derive(Clone)]
pub struct PgStockService {
    db: PgPool,
}

impl PgStockService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockService for PgStockService {
    async fn adjust_stock(
        &self,
        conn: &mut PgConnection,
        key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        delta: StockDelta,
    ) -> AppResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_movements (idempotency_key, branch_id, product_id, qty_delta, weight_delta_kg, reason)
            VALUES ($1, $2, $3, $4, $5, 'transfer_discrepancy')
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(branch_id)
        .bind(product_id)
        .bind(delta.qty)
        .bind(delta.weight_kg)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!(%key, "Stock adjustment already applied");
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO branch_stock (branch_id, product_id, on_hand_qty, on_hand_weight_kg)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (branch_id, product_id) DO UPDATE
            SET on_hand_qty = branch_stock.on_hand_qty + EXCLUDED.on_hand_qty,
                on_hand_weight_kg = branch_stock.on_hand_weight_kg + EXCLUDED.on_hand_weight_kg,
                updated_at = NOW()
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .bind(delta.qty.unwrap_or_default())
        .bind(delta.weight_kg.unwrap_or_default())
        .execute(&mut *conn)
        .await?;

        tracing::info!(%branch_id, %product_id, qty = ?delta.qty, weight_kg = ?delta.weight_kg, "Stock adjusted");
        Ok(true)
    }

    async fn record_loss(
        &self,
        conn: &mut PgConnection,
        key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        amount: StockDelta,
    ) -> AppResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO inventory_losses (idempotency_key, branch_id, product_id, qty, weight_kg)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(branch_id)
        .bind(product_id)
        .bind(amount.qty)
        .bind(amount.weight_kg)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(%branch_id, %product_id, qty = ?amount.qty, weight_kg = ?amount.weight_kg, "Inventory loss recorded");
        }
        Ok(inserted > 0)
    }

    async fn on_hand(&self, branch_id: Uuid, product_id: Uuid) -> AppResult<StockLevel> {
        let row = sqlx::query_as::<_, StockLevelRow>(
            r#"
            SELECT on_hand_qty, on_hand_weight_kg
            FROM branch_stock
            WHERE branch_id = $1 AND product_id = $2
            "#,
        )
        .bind(branch_id)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row
            .map(|r| StockLevel {
                on_hand_qty: r.on_hand_qty,
                on_hand_weight_kg: r.on_hand_weight_kg,
            })
            .unwrap_or_default())
    }
}
