//! Loading and saving transfer aggregates
//!
//! A mutation runs in one transaction: the transfer row is locked with
//! `FOR UPDATE`, the aggregate is rebuilt, the pure operation is applied and
//! the result is written back with a version check. Events are handed to the
//! sink only after commit.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Discrepancy, DiscrepancyLine, Disposition, Receipt, Shipment, Transfer, TransferAggregate,
    TransferError, TransferLine, TransferResult,
};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{is_conflict, AppError, AppResult};
use crate::services::events::EventSink;

// ============================================================================
// Rows
// ============================================================================

#[derive(Debug, FromRow)]
pub(crate) struct TransferRow {
    pub id: Uuid,
    pub reference_no: String,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TransferRow> for Transfer {
    type Error = AppError;

    fn try_from(row: TransferRow) -> AppResult<Self> {
        Ok(Transfer {
            id: row.id,
            reference_no: row.reference_no,
            from_branch_id: row.from_branch_id,
            to_branch_id: row.to_branch_id,
            status: parse_column(&row.status)?,
            notes: row.notes,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    transfer_id: Uuid,
    line_no: i32,
    product_id: Uuid,
    expected_qty: Decimal,
}

#[derive(Debug, FromRow)]
struct ShipmentRow {
    id: Uuid,
    transfer_id: Uuid,
    transporter_name: String,
    vehicle_no: String,
    lr_no: Option<String>,
    gross_weight_kg: Decimal,
    tare_weight_kg: Decimal,
    net_weight_kg: Decimal,
    dispatch_ts: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReceiptRow {
    id: Uuid,
    transfer_id: Uuid,
    reweigh_gross_kg: Decimal,
    reweigh_tare_kg: Decimal,
    reweigh_net_kg: Decimal,
    shipped_net_kg: Decimal,
    tolerance_percent: Decimal,
    variance_ratio: Option<Decimal>,
    within_tolerance: bool,
    arrival_ts: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DiscrepancyRow {
    id: Uuid,
    transfer_id: Uuid,
    reason_category: String,
    status: String,
    notes: Option<String>,
    resolution_notes: Option<String>,
    created_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct DiscrepancyLineRow {
    id: Uuid,
    discrepancy_id: Uuid,
    product_id: Option<Uuid>,
    qty_delta: Option<Decimal>,
    weight_delta_kg: Option<Decimal>,
    disposition: Option<String>,
    notes: Option<String>,
}

/// Parse a status/category column; a bad value means the schema and code disagree
fn parse_column<T: FromStr<Err = String>>(value: &str) -> AppResult<T> {
    value.parse().map_err(AppError::Internal)
}

/// Reported when the lock itself failed, before any version was read
const UNKNOWN_VERSION: i64 = -1;

pub(crate) const TRANSFER_COLUMNS: &str = "id, reference_no, from_branch_id, to_branch_id, status, notes, version, created_at, updated_at";

// ============================================================================
// Store
// ============================================================================

#[derive(Clone)]
pub struct TransferStore {
    db: PgPool,
    events: Arc<dyn EventSink>,
}

impl TransferStore {
    pub fn new(db: PgPool, events: Arc<dyn EventSink>) -> Self {
        Self { db, events }
    }

    pub fn db(&self) -> &PgPool {
        &self.db
    }

    pub async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        Ok(self.db.begin().await?)
    }

    /// Read-only snapshot
    pub async fn get(&self, transfer_id: Uuid) -> AppResult<TransferAggregate> {
        let mut conn = self.db.acquire().await?;
        load(&mut conn, transfer_id, false).await
    }

    /// Insert a brand new aggregate and publish its events
    pub async fn insert(&self, aggregate: &mut TransferAggregate, created_by: Uuid) -> AppResult<()> {
        let mut tx = self.begin().await?;
        let transfer = &aggregate.transfer;

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, reference_no, from_branch_id, to_branch_id, status, notes,
                version, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(transfer.id)
        .bind(&transfer.reference_no)
        .bind(transfer.from_branch_id)
        .bind(transfer.to_branch_id)
        .bind(transfer.status.as_str())
        .bind(&transfer.notes)
        .bind(transfer.version)
        .bind(created_by)
        .bind(transfer.created_at)
        .bind(transfer.updated_at)
        .execute(&mut *tx)
        .await?;

        for line in &aggregate.lines {
            sqlx::query(
                r#"
                INSERT INTO transfer_lines (transfer_id, line_no, product_id, expected_qty)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(line.transfer_id)
            .bind(line.line_no)
            .bind(line.product_id)
            .bind(line.expected_qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.events.publish_all(aggregate.take_events());
        Ok(())
    }

    /// Lock, apply `op`, persist and publish.
    ///
    /// When `op` fails after changing the aggregate (a resolution attempt that
    /// reopens its discrepancy) the change is still committed and the error is
    /// returned afterwards.
    pub async fn mutate<T, F>(&self, transfer_id: Uuid, op: F) -> AppResult<(T, TransferAggregate)>
    where
        F: FnOnce(&mut TransferAggregate) -> TransferResult<T>,
    {
        let mut tx = self.begin().await?;
        let mut aggregate = lock(&mut tx, transfer_id).await?;
        let before = aggregate.clone();

        match op(&mut aggregate) {
            Ok(value) => {
                save(&mut tx, &mut aggregate).await?;
                self.commit(tx, &mut aggregate).await?;
                Ok((value, aggregate))
            }
            Err(err) => {
                if aggregate != before {
                    save(&mut tx, &mut aggregate).await?;
                    self.commit(tx, &mut aggregate).await?;
                }
                Err(err.into())
            }
        }
    }

    /// Commit and publish what the aggregate buffered
    pub async fn commit(
        &self,
        tx: Transaction<'static, Postgres>,
        aggregate: &mut TransferAggregate,
    ) -> AppResult<()> {
        let transfer_id = aggregate.id();
        let version = aggregate.transfer.version;
        tx.commit()
            .await
            .map_err(|e| conflict_or_db(e, transfer_id, version))?;
        self.events.publish_all(aggregate.take_events());
        Ok(())
    }
}

/// Translate lock/serialization failures into a retryable domain conflict
pub(crate) fn conflict_or_db(err: sqlx::Error, transfer_id: Uuid, expected_version: i64) -> AppError {
    if is_conflict(&err) {
        TransferError::ConcurrencyConflict {
            transfer_id,
            expected_version,
        }
        .into()
    } else {
        AppError::DatabaseError(err)
    }
}

/// Load with the transfer row locked for the rest of the transaction
pub async fn lock(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<TransferAggregate> {
    load(conn, transfer_id, true).await
}

async fn load(conn: &mut PgConnection, transfer_id: Uuid, for_update: bool) -> AppResult<TransferAggregate> {
    let sql = format!(
        "SELECT {} FROM transfers WHERE id = $1{}",
        TRANSFER_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let transfer: Transfer = sqlx::query_as::<_, TransferRow>(&sql)
        .bind(transfer_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| conflict_or_db(e, transfer_id, UNKNOWN_VERSION))?
        .ok_or(TransferError::NotFound {
            entity: "transfer",
            id: transfer_id,
        })?
        .try_into()?;

    let lines = sqlx::query_as::<_, LineRow>(
        r#"
        SELECT transfer_id, line_no, product_id, expected_qty
        FROM transfer_lines
        WHERE transfer_id = $1
        ORDER BY line_no
        "#,
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| TransferLine {
        transfer_id: r.transfer_id,
        line_no: r.line_no,
        product_id: r.product_id,
        expected_qty: r.expected_qty,
    })
    .collect();

    let shipments = sqlx::query_as::<_, ShipmentRow>(
        r#"
        SELECT id, transfer_id, transporter_name, vehicle_no, lr_no,
               gross_weight_kg, tare_weight_kg, net_weight_kg, dispatch_ts
        FROM shipments
        WHERE transfer_id = $1
        ORDER BY dispatch_ts, id
        "#,
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| Shipment {
        id: r.id,
        transfer_id: r.transfer_id,
        transporter_name: r.transporter_name,
        vehicle_no: r.vehicle_no,
        lr_no: r.lr_no,
        gross_weight_kg: r.gross_weight_kg,
        tare_weight_kg: r.tare_weight_kg,
        net_weight_kg: r.net_weight_kg,
        dispatch_ts: r.dispatch_ts,
    })
    .collect();

    let receipts = sqlx::query_as::<_, ReceiptRow>(
        r#"
        SELECT id, transfer_id, reweigh_gross_kg, reweigh_tare_kg, reweigh_net_kg,
               shipped_net_kg, tolerance_percent, variance_ratio, within_tolerance, arrival_ts
        FROM receipts
        WHERE transfer_id = $1
        "#,
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|r| Receipt {
        id: r.id,
        transfer_id: r.transfer_id,
        reweigh_gross_kg: r.reweigh_gross_kg,
        reweigh_tare_kg: r.reweigh_tare_kg,
        reweigh_net_kg: r.reweigh_net_kg,
        shipped_net_kg: r.shipped_net_kg,
        tolerance_percent: r.tolerance_percent,
        variance_ratio: r.variance_ratio,
        within_tolerance: r.within_tolerance,
        arrival_ts: r.arrival_ts,
    })
    .collect();

    let discrepancies = load_discrepancies(conn, transfer_id).await?;

    Ok(TransferAggregate::from_parts(
        transfer,
        lines,
        shipments,
        receipts,
        discrepancies,
    ))
}

async fn load_discrepancies(conn: &mut PgConnection, transfer_id: Uuid) -> AppResult<Vec<Discrepancy>> {
    let rows = sqlx::query_as::<_, DiscrepancyRow>(
        r#"
        SELECT id, transfer_id, reason_category, status, notes, resolution_notes,
               created_at, resolved_at
        FROM discrepancies
        WHERE transfer_id = $1
        ORDER BY seq
        "#,
    )
    .bind(transfer_id)
    .fetch_all(&mut *conn)
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let line_rows = sqlx::query_as::<_, DiscrepancyLineRow>(
        r#"
        SELECT id, discrepancy_id, product_id, qty_delta, weight_delta_kg, disposition, notes
        FROM discrepancy_lines
        WHERE discrepancy_id = ANY($1)
        ORDER BY discrepancy_id, line_no
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines_by_discrepancy: HashMap<Uuid, Vec<DiscrepancyLine>> = HashMap::new();
    for line in line_rows {
        lines_by_discrepancy
            .entry(line.discrepancy_id)
            .or_default()
            .push(DiscrepancyLine {
                id: line.id,
                discrepancy_id: line.discrepancy_id,
                product_id: line.product_id,
                qty_delta: line.qty_delta,
                weight_delta_kg: line.weight_delta_kg,
                disposition: line
                    .disposition
                    .as_deref()
                    .map(parse_column::<Disposition>)
                    .transpose()?,
                notes: line.notes,
            });
    }

    rows.into_iter()
        .map(|row| -> AppResult<Discrepancy> {
            Ok(Discrepancy {
                id: row.id,
                transfer_id: row.transfer_id,
                reason_category: parse_column(&row.reason_category)?,
                status: parse_column(&row.status)?,
                notes: row.notes,
                resolution_notes: row.resolution_notes,
                created_at: row.created_at,
                resolved_at: row.resolved_at,
                lines: lines_by_discrepancy.remove(&row.id).unwrap_or_default(),
            })
        })
        .collect()
}

/// Write the aggregate back. The transfer row is guarded by its version;
/// children are append-only apart from discrepancy status and dispositions.
pub async fn save(conn: &mut PgConnection, aggregate: &mut TransferAggregate) -> AppResult<()> {
    let transfer = &aggregate.transfer;
    let expected_version = transfer.version;

    let updated = sqlx::query(
        r#"
        UPDATE transfers
        SET status = $3, notes = $4, version = version + 1, updated_at = $5
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(transfer.id)
    .bind(expected_version)
    .bind(transfer.status.as_str())
    .bind(&transfer.notes)
    .bind(transfer.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| conflict_or_db(e, transfer.id, expected_version))?
    .rows_affected();

    if updated == 0 {
        return Err(TransferError::ConcurrencyConflict {
            transfer_id: transfer.id,
            expected_version,
        }
        .into());
    }

    for shipment in &aggregate.shipments {
        sqlx::query(
            r#"
            INSERT INTO shipments (
                id, transfer_id, transporter_name, vehicle_no, lr_no,
                gross_weight_kg, tare_weight_kg, net_weight_kg, dispatch_ts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(shipment.id)
        .bind(shipment.transfer_id)
        .bind(&shipment.transporter_name)
        .bind(&shipment.vehicle_no)
        .bind(&shipment.lr_no)
        .bind(shipment.gross_weight_kg)
        .bind(shipment.tare_weight_kg)
        .bind(shipment.net_weight_kg)
        .bind(shipment.dispatch_ts)
        .execute(&mut *conn)
        .await?;
    }

    for receipt in &aggregate.receipts {
        sqlx::query(
            r#"
            INSERT INTO receipts (
                id, transfer_id, reweigh_gross_kg, reweigh_tare_kg, reweigh_net_kg,
                shipped_net_kg, tolerance_percent, variance_ratio, within_tolerance, arrival_ts
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(receipt.id)
        .bind(receipt.transfer_id)
        .bind(receipt.reweigh_gross_kg)
        .bind(receipt.reweigh_tare_kg)
        .bind(receipt.reweigh_net_kg)
        .bind(receipt.shipped_net_kg)
        .bind(receipt.tolerance_percent)
        .bind(receipt.variance_ratio)
        .bind(receipt.within_tolerance)
        .bind(receipt.arrival_ts)
        .execute(&mut *conn)
        .await?;
    }

    for (seq, discrepancy) in (1i32..).zip(&aggregate.discrepancies) {
        sqlx::query(
            r#"
            INSERT INTO discrepancies (
                id, transfer_id, reason_category, status, notes, resolution_notes,
                created_at, resolved_at, seq
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                resolution_notes = EXCLUDED.resolution_notes,
                resolved_at = EXCLUDED.resolved_at
            "#,
        )
        .bind(discrepancy.id)
        .bind(discrepancy.transfer_id)
        .bind(discrepancy.reason_category.as_str())
        .bind(discrepancy.status.as_str())
        .bind(&discrepancy.notes)
        .bind(&discrepancy.resolution_notes)
        .bind(discrepancy.created_at)
        .bind(discrepancy.resolved_at)
        .bind(seq)
        .execute(&mut *conn)
        .await?;

        for (line_no, line) in (1i32..).zip(&discrepancy.lines) {
            sqlx::query(
                r#"
                INSERT INTO discrepancy_lines (
                    id, discrepancy_id, product_id, qty_delta, weight_delta_kg, disposition,
                    notes, line_no
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (id) DO UPDATE SET disposition = EXCLUDED.disposition
                "#,
            )
            .bind(line.id)
            .bind(line.discrepancy_id)
            .bind(line.product_id)
            .bind(line.qty_delta)
            .bind(line.weight_delta_kg)
            .bind(line.disposition.map(|d| d.as_str()))
            .bind(&line.notes)
            .bind(line_no)
            .execute(&mut *conn)
            .await?;
        }
    }

    aggregate.transfer.version = expected_version + 1;
    Ok(())
}
