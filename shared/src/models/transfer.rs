//! Inter-branch transfer models and the transfer status graph

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request to move expected quantities of products between two branches
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transfer {
    pub id: Uuid,
    /// Human-readable number, e.g. "BR-2025-00042"
    pub reference_no: String,
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub status: TransferStatus,
    pub notes: Option<String>,
    /// Incremented on every persisted mutation
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Expected product quantity on a transfer. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferLine {
    pub transfer_id: Uuid,
    pub line_no: i32,
    pub product_id: Uuid,
    pub expected_qty: Decimal,
}

/// Transfer lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Approved,
    Dispatched,
    InTransit,
    DeliveredPendingConfirm,
    Completed,
    Discrepant,
    Resolved,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 8] = [
        TransferStatus::Draft,
        TransferStatus::Approved,
        TransferStatus::Dispatched,
        TransferStatus::InTransit,
        TransferStatus::DeliveredPendingConfirm,
        TransferStatus::Completed,
        TransferStatus::Discrepant,
        TransferStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "draft",
            TransferStatus::Approved => "approved",
            TransferStatus::Dispatched => "dispatched",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::DeliveredPendingConfirm => "delivered_pending_confirm",
            TransferStatus::Completed => "completed",
            TransferStatus::Discrepant => "discrepant",
            TransferStatus::Resolved => "resolved",
        }
    }

    /// Statuses reachable in one step.
    ///
    /// Strictly linear with a single fork at `delivered_pending_confirm`.
    pub fn successors(&self) -> &'static [TransferStatus] {
        match self {
            TransferStatus::Draft => &[TransferStatus::Approved],
            TransferStatus::Approved => &[TransferStatus::Dispatched],
            TransferStatus::Dispatched => &[TransferStatus::InTransit],
            TransferStatus::InTransit => &[TransferStatus::DeliveredPendingConfirm],
            TransferStatus::DeliveredPendingConfirm => {
                &[TransferStatus::Completed, TransferStatus::Discrepant]
            }
            TransferStatus::Discrepant => &[TransferStatus::Resolved],
            TransferStatus::Completed | TransferStatus::Resolved => &[],
        }
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        self.successors().contains(&next)
    }

    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransferStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown transfer status: {}", s))
    }
}

/// Requested line on a new transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransferLine {
    pub product_id: Uuid,
    pub expected_qty: Decimal,
}

/// Data needed to open a draft transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from_branch_id: Uuid,
    pub to_branch_id: Uuid,
    pub lines: Vec<NewTransferLine>,
    pub notes: Option<String>,
}

/// Render a reference number from an allocated sequence value
pub fn format_reference_no(prefix: &str, year: i32, sequence: i64) -> String {
    format!("{}-{}-{:05}", prefix, year, sequence)
}
