//! Shipment (dispatch) models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical dispatch event with weighed cargo. A transfer may have several.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shipment {
    pub id: Uuid,
    pub transfer_id: Uuid,
    pub transporter_name: String,
    pub vehicle_no: String,
    /// Lorry receipt number
    pub lr_no: Option<String>,
    pub gross_weight_kg: Decimal,
    pub tare_weight_kg: Decimal,
    /// Always gross - tare, computed at write time
    pub net_weight_kg: Decimal,
    pub dispatch_ts: DateTime<Utc>,
}

/// Dispatch data captured at the sending branch weighbridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentInput {
    pub transporter_name: String,
    pub vehicle_no: String,
    pub lr_no: Option<String>,
    pub gross_weight_kg: Decimal,
    pub tare_weight_kg: Decimal,
}
