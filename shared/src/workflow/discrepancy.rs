//! Discrepancy lifecycle and disposition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransferAggregate;
use crate::error::{TransferError, TransferResult};
use crate::models::{
    Discrepancy, DiscrepancyLine, DiscrepancyStatus, Disposition, NewDiscrepancy, StockDelta,
    StockEffect, TransferEvent, TransferStatus,
};
use crate::validation::validate_discrepancy_lines;

/// Result of a successful resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub discrepancy: Discrepancy,
    /// Stock side effects to hand to the stock service, one per non-zero line
    pub effects: Vec<StockEffect>,
    pub transfer_status: TransferStatus,
}

impl TransferAggregate {
    /// Manually raise a discrepancy, e.g. damage found after unloading
    pub fn raise_discrepancy(
        &mut self,
        input: NewDiscrepancy,
        now: DateTime<Utc>,
    ) -> TransferResult<Discrepancy> {
        self.require_status(
            &[TransferStatus::DeliveredPendingConfirm, TransferStatus::Discrepant],
            "raise a discrepancy on",
        )?;
        validate_discrepancy_lines(&input.lines, &self.product_ids())?;

        let id = Uuid::new_v4();
        let discrepancy = Discrepancy {
            id,
            transfer_id: self.transfer.id,
            reason_category: input.reason_category,
            status: DiscrepancyStatus::Open,
            notes: input.notes,
            resolution_notes: None,
            created_at: now,
            resolved_at: None,
            lines: input
                .lines
                .into_iter()
                .map(|line| DiscrepancyLine {
                    id: Uuid::new_v4(),
                    discrepancy_id: id,
                    product_id: Some(line.product_id),
                    qty_delta: line.qty_delta,
                    weight_delta_kg: line.weight_delta_kg,
                    disposition: None,
                    notes: line.notes,
                })
                .collect(),
        };

        self.discrepancies.push(discrepancy.clone());
        self.emit(TransferEvent::DiscrepancyRaised {
            discrepancy_id: id,
            transfer_id: self.transfer.id,
        });
        if self.transfer.status == TransferStatus::DeliveredPendingConfirm {
            self.transition(TransferStatus::Discrepant, "raise a discrepancy on", now)?;
        }
        self.transfer.updated_at = now;

        Ok(discrepancy)
    }

    /// `open | reopened -> under_review`
    pub fn start_review(&mut self, discrepancy_id: Uuid, now: DateTime<Utc>) -> TransferResult<Discrepancy> {
        let idx = self.discrepancy_index(discrepancy_id)?;
        self.require_discrepancy_status(
            idx,
            &[DiscrepancyStatus::Open, DiscrepancyStatus::Reopened],
            "review",
        )?;

        self.discrepancies[idx].status = DiscrepancyStatus::UnderReview;
        self.transfer.updated_at = now;
        Ok(self.discrepancies[idx].clone())
    }

    /// `under_review -> reopened` after a failed review
    pub fn reopen(
        &mut self,
        discrepancy_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> TransferResult<Discrepancy> {
        let idx = self.discrepancy_index(discrepancy_id)?;
        self.require_discrepancy_status(idx, &[DiscrepancyStatus::UnderReview], "reopen")?;

        let discrepancy = &mut self.discrepancies[idx];
        discrepancy.status = DiscrepancyStatus::Reopened;
        if notes.is_some() {
            discrepancy.resolution_notes = notes;
        }
        self.transfer.updated_at = now;
        Ok(self.discrepancies[idx].clone())
    }

    /// Apply a disposition to every line and close the discrepancy.
    ///
    /// Invalid disposition data fails with a validation error; a discrepancy
    /// that was under review is moved to `reopened` in that case so the failed
    /// attempt is visible. Once every discrepancy is resolved the transfer
    /// itself becomes `resolved`.
    pub fn resolve(
        &mut self,
        discrepancy_id: Uuid,
        disposition: Disposition,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> TransferResult<Resolution> {
        let idx = self.discrepancy_index(discrepancy_id)?;
        self.require_discrepancy_status(
            idx,
            &[
                DiscrepancyStatus::Open,
                DiscrepancyStatus::UnderReview,
                DiscrepancyStatus::Reopened,
            ],
            "resolve",
        )?;

        let effects = match self.stock_effects(&self.discrepancies[idx], disposition) {
            Ok(effects) => effects,
            Err(err) => {
                let discrepancy = &mut self.discrepancies[idx];
                if discrepancy.status == DiscrepancyStatus::UnderReview {
                    discrepancy.status = DiscrepancyStatus::Reopened;
                    self.transfer.updated_at = now;
                }
                return Err(err);
            }
        };

        let discrepancy = &mut self.discrepancies[idx];
        for line in discrepancy.lines.iter_mut() {
            line.disposition = Some(disposition);
        }
        discrepancy.status = DiscrepancyStatus::Resolved;
        discrepancy.resolved_at = Some(now);
        discrepancy.resolution_notes = notes;
        let resolved = discrepancy.clone();

        self.emit(TransferEvent::DiscrepancyResolved { discrepancy_id });
        self.transfer.updated_at = now;
        self.derive_resolution_status(now)?;

        Ok(Resolution {
            discrepancy: resolved,
            effects,
            transfer_status: self.transfer.status,
        })
    }

    fn stock_effects(
        &self,
        discrepancy: &Discrepancy,
        disposition: Disposition,
    ) -> TransferResult<Vec<StockEffect>> {
        let mut effects = Vec::new();

        for (idx, line) in discrepancy.lines.iter().enumerate() {
            let delta = StockDelta::new(line.qty_delta, line.weight_delta_kg);
            if delta.is_zero() {
                continue;
            }
            let product_id = line.product_id.ok_or_else(|| {
                TransferError::validation(
                    format!("lines[{}].product_id", idx),
                    "Aggregate variance line has no product; enter per-product lines before resolving",
                )
            })?;

            let effect = match disposition {
                Disposition::Adjust => StockEffect::Adjust {
                    idempotency_key: line.id,
                    branch_id: self.transfer.to_branch_id,
                    product_id,
                    delta,
                },
                Disposition::Scrap => {
                    if delta.has_surplus() {
                        return Err(TransferError::validation(
                            format!("lines[{}]", idx),
                            "Only a shortage can be scrapped; use adjust for a surplus",
                        ));
                    }
                    StockEffect::Loss {
                        idempotency_key: line.id,
                        branch_id: self.transfer.from_branch_id,
                        product_id,
                        amount: delta.abs(),
                    }
                }
            };
            effects.push(effect);
        }
        Ok(effects)
    }

    fn discrepancy_index(&self, discrepancy_id: Uuid) -> TransferResult<usize> {
        self.discrepancies
            .iter()
            .position(|d| d.id == discrepancy_id)
            .ok_or(TransferError::NotFound {
                entity: "discrepancy",
                id: discrepancy_id,
            })
    }

    fn require_discrepancy_status(
        &self,
        idx: usize,
        allowed: &[DiscrepancyStatus],
        action: &'static str,
    ) -> TransferResult<()> {
        let discrepancy = &self.discrepancies[idx];
        if allowed.contains(&discrepancy.status) {
            Ok(())
        } else {
            Err(TransferError::InvalidState {
                entity: "discrepancy",
                id: discrepancy.id,
                status: discrepancy.status.to_string(),
                action,
            })
        }
    }
}
