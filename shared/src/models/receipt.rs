//! Receipt (arrival re-weigh) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Receiving branch re-weigh record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Receipt {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub reweigh_gross_kg: Decimal,
    pub reweigh_tare_kg: Decimal,
    pub reweigh_net_kg: Decimal,
    /// Sum of shipment net weights this receipt was compared against
    pub shipped_net_kg: Decimal,
    pub tolerance_percent: Decimal,
    /// None when nothing was shipped (ratio undefined)
    pub variance_ratio: Option<Decimal>,
    pub within_tolerance: bool,
    pub arrival_ts: DateTime<Utc>,
}

/// Quantity mismatch noticed while unloading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnloadingMismatch {
    pub product_id: Uuid,
    /// Signed, negative means fewer units arrived
    pub qty_delta: Decimal,
    pub notes: Option<String>,
}

/// Re-weigh data entered at the receiving branch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptInput {
    pub reweigh_gross_kg: Decimal,
    pub reweigh_tare_kg: Decimal,
    /// Falls back to the configured default policy when absent
    pub tolerance_percent: Option<Decimal>,
    #[serde(default)]
    pub unloading_mismatches: Vec<UnloadingMismatch>,
}
