//! Dispatch tracking: one or more partial shipments per transfer

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::TransferAggregate;
use crate::error::{TransferError, TransferResult};
use crate::models::{Shipment, ShipmentInput, TransferStatus};
use crate::reconciliation::net_weight;
use crate::validation::{validate_shipment_input, MAX_MEASURE};

const DISPATCHABLE: [TransferStatus; 3] = [
    TransferStatus::Approved,
    TransferStatus::Dispatched,
    TransferStatus::InTransit,
];

impl TransferAggregate {
    /// Record a shipment. The first one moves the transfer through
    /// `dispatched` into `in_transit`; later ones leave the status alone.
    pub fn dispatch(&mut self, input: ShipmentInput, now: DateTime<Utc>) -> TransferResult<Shipment> {
        self.require_status(&DISPATCHABLE, "dispatch")?;
        validate_shipment_input(&input)?;
        let net_weight_kg = net_weight(input.gross_weight_kg, input.tare_weight_kg)?;
        if self.shipped_net_kg() + net_weight_kg > MAX_MEASURE {
            return Err(TransferError::validation(
                "gross_weight_kg",
                format!("Total shipped net weight would exceed {} kg", MAX_MEASURE),
            ));
        }

        let shipment = Shipment {
            id: Uuid::new_v4(),
            transfer_id: self.transfer.id,
            transporter_name: input.transporter_name.trim().to_string(),
            vehicle_no: input.vehicle_no.trim().to_uppercase(),
            lr_no: input.lr_no,
            gross_weight_kg: input.gross_weight_kg,
            tare_weight_kg: input.tare_weight_kg,
            net_weight_kg,
            dispatch_ts: now,
        };
        self.shipments.push(shipment.clone());

        if self.transfer.status == TransferStatus::Approved {
            self.transition(TransferStatus::Dispatched, "dispatch", now)?;
        }
        if self.transfer.status == TransferStatus::Dispatched {
            self.transition(TransferStatus::InTransit, "dispatch", now)?;
        }
        self.transfer.updated_at = now;

        Ok(shipment)
    }
}
