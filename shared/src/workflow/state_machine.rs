//! Explicit lifecycle actions: approve and mark reached

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::TransferAggregate;
use crate::error::{TransferError, TransferResult};
use crate::models::{DiscrepancyStatus, TransferStatus};

impl TransferAggregate {
    /// `draft -> approved`. Requires at least one line with a positive quantity.
    pub fn approve(&mut self, now: DateTime<Utc>) -> TransferResult<()> {
        self.require_status(&[TransferStatus::Draft], "approve")?;

        if !self.lines.iter().any(|l| l.expected_qty > Decimal::ZERO) {
            return Err(TransferError::validation(
                "lines",
                "A transfer needs at least one line with a positive quantity to be approved",
            ));
        }
        if let Some(line) = self.lines.iter().find(|l| l.expected_qty <= Decimal::ZERO) {
            return Err(TransferError::validation(
                format!("lines[{}].expected_qty", line.line_no - 1),
                "Expected quantity must be positive",
            ));
        }

        self.transition(TransferStatus::Approved, "approve", now)
    }

    /// `in_transit -> delivered_pending_confirm`
    pub fn mark_reached(&mut self, now: DateTime<Utc>) -> TransferResult<()> {
        self.require_status(&[TransferStatus::InTransit], "mark reached")?;
        self.transition(TransferStatus::DeliveredPendingConfirm, "mark reached", now)
    }

    /// `discrepant -> resolved` once every child discrepancy is resolved
    pub(super) fn derive_resolution_status(&mut self, now: DateTime<Utc>) -> TransferResult<()> {
        let all_resolved = !self.discrepancies.is_empty()
            && self
                .discrepancies
                .iter()
                .all(|d| d.status == DiscrepancyStatus::Resolved);

        if all_resolved && self.transfer.status == TransferStatus::Discrepant {
            self.transition(TransferStatus::Resolved, "resolve", now)?;
        }
        Ok(())
    }
}
