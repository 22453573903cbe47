//! Branch stock mutation contract

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signed change in on-hand stock, by count and/or by weight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockDelta {
    pub qty: Option<Decimal>,
    pub weight_kg: Option<Decimal>,
}

impl StockDelta {
    pub fn new(qty: Option<Decimal>, weight_kg: Option<Decimal>) -> Self {
        Self { qty, weight_kg }
    }

    /// Nothing to apply
    pub fn is_zero(&self) -> bool {
        self.qty.unwrap_or_default().is_zero() && self.weight_kg.unwrap_or_default().is_zero()
    }

    /// Magnitude of the change, used when writing off a loss
    pub fn abs(&self) -> Self {
        Self {
            qty: self.qty.map(|q| q.abs()),
            weight_kg: self.weight_kg.map(|w| w.abs()),
        }
    }

    /// Any component increases stock
    pub fn has_surplus(&self) -> bool {
        self.qty.is_some_and(|q| q > Decimal::ZERO)
            || self.weight_kg.is_some_and(|w| w > Decimal::ZERO)
    }
}

/// A stock side effect decided by discrepancy resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockEffect {
    /// Credit/debit on-hand stock at a branch
    Adjust {
        idempotency_key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        delta: StockDelta,
    },
    /// Inventory loss reported to accounting; no branch is credited
    Loss {
        idempotency_key: Uuid,
        branch_id: Uuid,
        product_id: Uuid,
        amount: StockDelta,
    },
}

/// On-hand position of a product at a branch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StockLevel {
    pub on_hand_qty: Decimal,
    pub on_hand_weight_kg: Decimal,
}
