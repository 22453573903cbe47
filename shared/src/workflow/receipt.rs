//! Receipt processing: re-weigh on arrival and tolerance decision

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransferAggregate;
use crate::error::{TransferError, TransferResult};
use crate::models::{
    Discrepancy, DiscrepancyLine, DiscrepancyStatus, ReasonCategory, Receipt, ReceiptInput,
    TransferEvent, TransferStatus, UnloadingMismatch,
};
use crate::reconciliation::{self, WeightComparison};
use crate::validation::validate_receipt_input;

/// What a receipt produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptOutcome {
    pub receipt: Receipt,
    /// Weight variance discrepancy and/or unloading quantity discrepancy
    pub discrepancies: Vec<Discrepancy>,
    pub transfer_status: TransferStatus,
}

impl ReceiptOutcome {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

impl TransferAggregate {
    /// Record the arrival re-weigh and complete the transfer or open discrepancies.
    ///
    /// Accepted from `in_transit` (the transfer passes through
    /// `delivered_pending_confirm`) and from `delivered_pending_confirm`.
    pub fn receive(
        &mut self,
        input: ReceiptInput,
        default_tolerance_percent: Decimal,
        now: DateTime<Utc>,
    ) -> TransferResult<ReceiptOutcome> {
        self.require_status(
            &[TransferStatus::InTransit, TransferStatus::DeliveredPendingConfirm],
            "receive",
        )?;
        validate_receipt_input(&input)?;

        let tolerance = input.tolerance_percent.unwrap_or(default_tolerance_percent);
        let comparison = reconciliation::compare(
            self.shipped_net_kg(),
            input.reweigh_gross_kg,
            input.reweigh_tare_kg,
            tolerance,
        )?;
        self.validate_unloading_mismatches(&input.unloading_mismatches)?;

        let mut raised = Vec::new();
        if !comparison.within_tolerance {
            raised.push(self.weight_variance_discrepancy(&comparison, now)?);
        }
        if !input.unloading_mismatches.is_empty() {
            raised.push(self.unloading_discrepancy(&input.unloading_mismatches, now));
        }

        if self.transfer.status == TransferStatus::InTransit {
            self.transition(TransferStatus::DeliveredPendingConfirm, "receive", now)?;
        }

        let receipt = Receipt {
            id: Uuid::new_v4(),
            transfer_id: self.transfer.id,
            reweigh_gross_kg: input.reweigh_gross_kg,
            reweigh_tare_kg: input.reweigh_tare_kg,
            reweigh_net_kg: comparison.received_net_kg,
            shipped_net_kg: comparison.shipped_net_kg,
            tolerance_percent: comparison.tolerance_percent,
            variance_ratio: comparison.variance_ratio,
            within_tolerance: comparison.within_tolerance,
            arrival_ts: now,
        };
        self.receipts.push(receipt.clone());

        if raised.is_empty() {
            self.transition(TransferStatus::Completed, "receive", now)?;
        } else {
            for discrepancy in &raised {
                self.discrepancies.push(discrepancy.clone());
                self.emit(TransferEvent::DiscrepancyRaised {
                    discrepancy_id: discrepancy.id,
                    transfer_id: self.transfer.id,
                });
            }
            self.transition(TransferStatus::Discrepant, "receive", now)?;
        }

        Ok(ReceiptOutcome {
            receipt,
            discrepancies: raised,
            transfer_status: self.transfer.status,
        })
    }

    fn validate_unloading_mismatches(&self, mismatches: &[UnloadingMismatch]) -> TransferResult<()> {
        let products = self.product_ids();
        for (idx, mismatch) in mismatches.iter().enumerate() {
            if !products.contains(&mismatch.product_id) {
                return Err(TransferError::validation(
                    format!("unloading_mismatches[{}].product_id", idx),
                    format!("Product {} is not on this transfer", mismatch.product_id),
                ));
            }
        }
        Ok(())
    }

    fn weight_variance_discrepancy(
        &self,
        comparison: &WeightComparison,
        now: DateTime<Utc>,
    ) -> TransferResult<Discrepancy> {
        let id = Uuid::new_v4();
        let expected: Vec<(Uuid, Decimal)> = self
            .lines
            .iter()
            .map(|l| (l.product_id, l.expected_qty))
            .collect();

        let lines = reconciliation::apportion(comparison, &expected)?
            .into_iter()
            .map(|delta| DiscrepancyLine {
                id: Uuid::new_v4(),
                discrepancy_id: id,
                product_id: delta.product_id,
                qty_delta: delta.qty_delta,
                weight_delta_kg: Some(delta.weight_delta_kg),
                disposition: None,
                notes: None,
            })
            .collect();

        let notes = match comparison.variance_ratio {
            Some(ratio) => format!(
                "Received {} kg against {} kg shipped ({}% variance, tolerance {}%)",
                comparison.received_net_kg,
                comparison.shipped_net_kg,
                (ratio * Decimal::ONE_HUNDRED).round_dp(2),
                comparison.tolerance_percent
            ),
            None => format!(
                "Received {} kg but no shipped weight was recorded",
                comparison.received_net_kg
            ),
        };

        Ok(Discrepancy {
            id,
            transfer_id: self.transfer.id,
            reason_category: ReasonCategory::WeightVariance,
            status: DiscrepancyStatus::Open,
            notes: Some(notes),
            resolution_notes: None,
            created_at: now,
            resolved_at: None,
            lines,
        })
    }

    fn unloading_discrepancy(&self, mismatches: &[UnloadingMismatch], now: DateTime<Utc>) -> Discrepancy {
        let id = Uuid::new_v4();
        Discrepancy {
            id,
            transfer_id: self.transfer.id,
            reason_category: ReasonCategory::QtyVariance,
            status: DiscrepancyStatus::Open,
            notes: Some("Quantity mismatch found during unloading".to_string()),
            resolution_notes: None,
            created_at: now,
            resolved_at: None,
            lines: mismatches
                .iter()
                .map(|m| DiscrepancyLine {
                    id: Uuid::new_v4(),
                    discrepancy_id: id,
                    product_id: Some(m.product_id),
                    qty_delta: Some(m.qty_delta),
                    weight_delta_kg: None,
                    disposition: None,
                    notes: m.notes.clone(),
                })
                .collect(),
        }
    }
}
