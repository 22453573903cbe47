//! Weight reconciliation: net weight, variance and tolerance classification
//!
//! Pure functions shared by the server and the WASM receiving-screen preview.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::validation::{validate_delta, validate_weight, MEASURE_SCALE};

/// Tolerance policy applied when the caller does not supply one
pub const DEFAULT_TOLERANCE_PERCENT: Decimal = Decimal::ONE;

/// Decimal places kept on apportioned deltas (gram precision)
pub const DELTA_SCALE: u32 = 3;

/// Net weight = gross - tare. Fails when the tare exceeds the gross.
pub fn net_weight(gross_kg: Decimal, tare_kg: Decimal) -> TransferResult<Decimal> {
    if gross_kg < tare_kg {
        return Err(TransferError::InvalidWeight { gross_kg, tare_kg });
    }
    if tare_kg < Decimal::ZERO {
        return Err(TransferError::validation(
            "tare_weight_kg",
            "Tare weight cannot be negative",
        ));
    }
    Ok(gross_kg - tare_kg)
}

/// Sum of net weights, the comparison baseline for a receipt
pub fn total_net<I>(weights: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    weights.into_iter().sum()
}

/// |received - shipped| / shipped, or None when nothing was shipped
pub fn variance_ratio(
    shipped_net_kg: Decimal,
    received_net_kg: Decimal,
) -> TransferResult<Option<Decimal>> {
    if shipped_net_kg.is_zero() {
        return Ok(None);
    }
    received_net_kg
        .checked_sub(shipped_net_kg)
        .and_then(|variance| variance.abs().checked_div(shipped_net_kg))
        .map(Some)
        .ok_or_else(|| out_of_range("received_net_kg"))
}

fn out_of_range(field: &str) -> TransferError {
    TransferError::validation(field, "Weight variance is outside the representable range")
}

/// Inclusive tolerance check. An undefined ratio is always out of tolerance.
pub fn is_within_tolerance(ratio: Option<Decimal>, tolerance_percent: Decimal) -> bool {
    match ratio {
        Some(ratio) => ratio <= tolerance_percent / Decimal::ONE_HUNDRED,
        None => false,
    }
}

/// Validate a tolerance percentage is within [0, 100]
pub fn validate_tolerance(tolerance_percent: Decimal) -> TransferResult<Decimal> {
    if tolerance_percent.normalize().scale() > MEASURE_SCALE {
        return Err(TransferError::validation(
            "tolerance_percent",
            format!("At most {} decimal places are allowed, got {}", MEASURE_SCALE, tolerance_percent),
        ));
    }
    if tolerance_percent < Decimal::ZERO || tolerance_percent > Decimal::ONE_HUNDRED {
        return Err(TransferError::validation(
            "tolerance_percent",
            format!(
                "Tolerance must be between 0 and 100 percent, got {}",
                tolerance_percent
            ),
        ));
    }
    Ok(tolerance_percent)
}

/// Result of comparing a re-weigh against shipped weight
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeightComparison {
    pub shipped_net_kg: Decimal,
    pub received_net_kg: Decimal,
    /// received - shipped, negative = shortage
    pub variance_kg: Decimal,
    pub variance_ratio: Option<Decimal>,
    pub tolerance_percent: Decimal,
    pub within_tolerance: bool,
}

/// Full comparison of a re-weigh (gross/tare) against the shipped baseline.
///
/// Every weight must be storable: non-negative, at most three decimals and
/// below 100 billion kg.
pub fn compare(
    shipped_net_kg: Decimal,
    reweigh_gross_kg: Decimal,
    reweigh_tare_kg: Decimal,
    tolerance_percent: Decimal,
) -> TransferResult<WeightComparison> {
    let tolerance_percent = validate_tolerance(tolerance_percent)?;
    validate_weight("shipped_net_kg", shipped_net_kg)?;
    validate_weight("reweigh_gross_kg", reweigh_gross_kg)?;
    validate_weight("reweigh_tare_kg", reweigh_tare_kg)?;
    let received_net_kg = net_weight(reweigh_gross_kg, reweigh_tare_kg)?;
    let ratio = variance_ratio(shipped_net_kg, received_net_kg)?;

    Ok(WeightComparison {
        shipped_net_kg,
        received_net_kg,
        variance_kg: received_net_kg - shipped_net_kg,
        variance_ratio: ratio,
        tolerance_percent,
        within_tolerance: is_within_tolerance(ratio, tolerance_percent),
    })
}

/// Variance share for one product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApportionedDelta {
    /// None for the aggregate fallback line
    pub product_id: Option<Uuid>,
    pub qty_delta: Option<Decimal>,
    pub weight_delta_kg: Decimal,
}

/// Split a weight variance across product lines in proportion to expected qty.
///
/// Quantity deltas are scaled by the signed variance ratio and are omitted when
/// the shipped baseline is zero. The last line absorbs the rounding remainder so
/// weight deltas always sum to `comparison.variance_kg`. Without usable product
/// lines a single aggregate line is produced. Fails when a derived delta would
/// not fit a stored quantity.
pub fn apportion(
    comparison: &WeightComparison,
    lines: &[(Uuid, Decimal)],
) -> TransferResult<Vec<ApportionedDelta>> {
    let total_qty = lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, (_, qty)| acc.checked_add(*qty))
        .ok_or_else(|| out_of_range("expected_qty"))?;
    if lines.is_empty() || total_qty <= Decimal::ZERO {
        return Ok(vec![ApportionedDelta {
            product_id: None,
            qty_delta: None,
            weight_delta_kg: comparison.variance_kg,
        }]);
    }

    let signed_ratio = if comparison.shipped_net_kg.is_zero() {
        None
    } else {
        Some(
            comparison
                .variance_kg
                .checked_div(comparison.shipped_net_kg)
                .ok_or_else(|| out_of_range("reweigh_gross_kg"))?,
        )
    };

    let mut remaining = comparison.variance_kg;
    let last = lines.len() - 1;
    let mut deltas = Vec::with_capacity(lines.len());

    for (idx, (product_id, expected_qty)) in lines.iter().enumerate() {
        let weight_delta_kg = if idx == last {
            remaining
        } else {
            let share = comparison
                .variance_kg
                .checked_mul(*expected_qty)
                .and_then(|w| w.checked_div(total_qty))
                .ok_or_else(|| out_of_range("reweigh_gross_kg"))?
                .round_dp(DELTA_SCALE);
            remaining = remaining
                .checked_sub(share)
                .ok_or_else(|| out_of_range("reweigh_gross_kg"))?;
            share
        };

        let qty_delta = match signed_ratio {
            Some(ratio) => {
                let qty = expected_qty
                    .checked_mul(ratio)
                    .ok_or_else(|| out_of_range("reweigh_gross_kg"))?
                    .round_dp(DELTA_SCALE);
                validate_delta("reweigh_gross_kg", qty).map_err(|_| {
                    TransferError::validation(
                        "reweigh_gross_kg",
                        format!(
                            "Re-weigh implies a quantity variance of {} for product {}, outside the storable range",
                            qty, product_id
                        ),
                    )
                })?;
                Some(qty)
            }
            None => None,
        };

        deltas.push(ApportionedDelta {
            product_id: Some(*product_id),
            qty_delta,
            weight_delta_kg,
        });
    }
    Ok(deltas)
}
