//! Outbound events emitted for observers (broadcast, notification layers)

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TransferStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEvent {
    TransferStatusChanged {
        transfer_id: Uuid,
        from_status: TransferStatus,
        to_status: TransferStatus,
    },
    DiscrepancyRaised {
        discrepancy_id: Uuid,
        transfer_id: Uuid,
    },
    DiscrepancyResolved {
        discrepancy_id: Uuid,
    },
}

impl TransferEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TransferEvent::TransferStatusChanged { .. } => "TransferStatusChanged",
            TransferEvent::DiscrepancyRaised { .. } => "DiscrepancyRaised",
            TransferEvent::DiscrepancyResolved { .. } => "DiscrepancyResolved",
        }
    }
}
