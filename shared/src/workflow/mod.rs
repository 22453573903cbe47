//! Transfer workflow engine
//!
//! A [`TransferAggregate`] is the unit of consistency: one transfer together
//! with its lines, shipments, receipts and discrepancies. Every operation
//! validates fully before mutating, so a failed call leaves the aggregate
//! untouched. Events produced by successful operations are buffered and taken
//! by the caller once the change has been persisted.

mod discrepancy;
mod receipt;
mod shipment;
mod state_machine;

pub use discrepancy::Resolution;
pub use receipt::ReceiptOutcome;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::models::{
    Discrepancy, NewTransfer, Receipt, Shipment, Transfer, TransferEvent, TransferLine,
    TransferStatus,
};
use crate::reconciliation;
use crate::validation::validate_new_transfer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferAggregate {
    pub transfer: Transfer,
    pub lines: Vec<TransferLine>,
    pub shipments: Vec<Shipment>,
    pub receipts: Vec<Receipt>,
    pub discrepancies: Vec<Discrepancy>,
    #[serde(skip)]
    pending_events: Vec<TransferEvent>,
}

impl TransferAggregate {
    /// Open a new transfer in `draft`
    pub fn create(
        input: NewTransfer,
        reference_no: String,
        now: DateTime<Utc>,
    ) -> TransferResult<Self> {
        validate_new_transfer(&input)?;

        let id = Uuid::new_v4();
        let lines = input
            .lines
            .iter()
            .enumerate()
            .map(|(idx, line)| TransferLine {
                transfer_id: id,
                line_no: idx as i32 + 1,
                product_id: line.product_id,
                expected_qty: line.expected_qty,
            })
            .collect();

        Ok(Self {
            transfer: Transfer {
                id,
                reference_no,
                from_branch_id: input.from_branch_id,
                to_branch_id: input.to_branch_id,
                status: TransferStatus::Draft,
                notes: input.notes,
                version: 0,
                created_at: now,
                updated_at: now,
            },
            lines,
            shipments: Vec::new(),
            receipts: Vec::new(),
            discrepancies: Vec::new(),
            pending_events: Vec::new(),
        })
    }

    /// Rebuild from persisted rows
    pub fn from_parts(
        transfer: Transfer,
        lines: Vec<TransferLine>,
        shipments: Vec<Shipment>,
        receipts: Vec<Receipt>,
        discrepancies: Vec<Discrepancy>,
    ) -> Self {
        Self {
            transfer,
            lines,
            shipments,
            receipts,
            discrepancies,
            pending_events: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.transfer.id
    }

    pub fn status(&self) -> TransferStatus {
        self.transfer.status
    }

    /// Sum of net weight over all shipments
    pub fn shipped_net_kg(&self) -> Decimal {
        reconciliation::total_net(self.shipments.iter().map(|s| s.net_weight_kg))
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.lines.iter().map(|l| l.product_id).collect()
    }

    pub fn discrepancy(&self, discrepancy_id: Uuid) -> Option<&Discrepancy> {
        self.discrepancies.iter().find(|d| d.id == discrepancy_id)
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<TransferEvent> {
        std::mem::take(&mut self.pending_events)
    }

    pub fn pending_events(&self) -> &[TransferEvent] {
        &self.pending_events
    }

    fn invalid_state(&self, action: &'static str) -> TransferError {
        TransferError::InvalidState {
            entity: "transfer",
            id: self.transfer.id,
            status: self.transfer.status.to_string(),
            action,
        }
    }

    /// Fail unless the transfer is in one of `allowed`
    fn require_status(
        &self,
        allowed: &[TransferStatus],
        action: &'static str,
    ) -> TransferResult<()> {
        if allowed.contains(&self.transfer.status) {
            Ok(())
        } else {
            Err(self.invalid_state(action))
        }
    }

    /// Single-step move along the status graph
    fn transition(
        &mut self,
        to: TransferStatus,
        action: &'static str,
        now: DateTime<Utc>,
    ) -> TransferResult<()> {
        let from = self.transfer.status;
        if !from.can_transition_to(to) {
            return Err(self.invalid_state(action));
        }
        self.transfer.status = to;
        self.transfer.updated_at = now;
        self.pending_events.push(TransferEvent::TransferStatusChanged {
            transfer_id: self.transfer.id,
            from_status: from,
            to_status: to,
        });
        Ok(())
    }

    fn emit(&mut self, event: TransferEvent) {
        self.pending_events.push(event);
    }
}
