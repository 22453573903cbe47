//! Validation utilities for transfer input data

use std::collections::HashSet;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{TransferError, TransferResult};
use crate::models::{
    NewDiscrepancyLine, NewTransfer, NewTransferLine, ReceiptInput, ShipmentInput,
};

// ============================================================================
// Measurement Validations
// ============================================================================

/// Decimal places a stored quantity or weight may carry
pub const MEASURE_SCALE: u32 = 3;

/// Largest magnitude a stored quantity or weight may carry: 99,999,999,999.999
pub const MAX_MEASURE: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 3);

fn validate_measure(field: &str, value: Decimal) -> TransferResult<()> {
    if value.normalize().scale() > MEASURE_SCALE {
        return Err(TransferError::validation(
            field,
            format!("At most {} decimal places are allowed, got {}", MEASURE_SCALE, value),
        ));
    }
    if value.abs() > MAX_MEASURE {
        return Err(TransferError::validation(
            field,
            format!("Magnitude must not exceed {}, got {}", MAX_MEASURE, value),
        ));
    }
    Ok(())
}

/// Non-negative weight in kg, gram precision
pub fn validate_weight(field: &str, value: Decimal) -> TransferResult<()> {
    if value < Decimal::ZERO {
        return Err(TransferError::validation(field, "Weight cannot be negative"));
    }
    validate_measure(field, value)
}

/// Strictly positive quantity
pub fn validate_qty(field: &str, value: Decimal) -> TransferResult<()> {
    if value <= Decimal::ZERO {
        return Err(TransferError::validation(field, "Quantity must be positive"));
    }
    validate_measure(field, value)
}

/// Signed quantity or weight delta
pub fn validate_delta(field: &str, value: Decimal) -> TransferResult<()> {
    validate_measure(field, value)
}

// ============================================================================
// Transfer Validations
// ============================================================================

/// Validate a new transfer request
pub fn validate_new_transfer(input: &NewTransfer) -> TransferResult<()> {
    if input.from_branch_id == input.to_branch_id {
        return Err(TransferError::validation(
            "to_branch_id",
            "Source and destination branch must differ",
        ));
    }
    validate_transfer_lines(&input.lines)
}

/// Lines must be non-empty, positive and reference each product once
pub fn validate_transfer_lines(lines: &[NewTransferLine]) -> TransferResult<()> {
    if lines.is_empty() {
        return Err(TransferError::validation(
            "lines",
            "Transfer must have at least one line",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, line) in lines.iter().enumerate() {
        validate_qty(&format!("lines[{}].expected_qty", idx), line.expected_qty)?;
        if !seen.insert(line.product_id) {
            return Err(TransferError::validation(
                format!("lines[{}].product_id", idx),
                format!("Product {} appears on more than one line", line.product_id),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// Dispatch Validations
// ============================================================================

/// Validate weighbridge and vehicle details of a dispatch
pub fn validate_shipment_input(input: &ShipmentInput) -> TransferResult<()> {
    if input.transporter_name.trim().is_empty() {
        return Err(TransferError::validation(
            "transporter_name",
            "Transporter name is required",
        ));
    }
    validate_vehicle_no(&input.vehicle_no)?;
    validate_weight("gross_weight_kg", input.gross_weight_kg)?;
    validate_weight("tare_weight_kg", input.tare_weight_kg)
}

/// Vehicle registration: 4-15 characters, alphanumeric with optional spaces or dashes
pub fn validate_vehicle_no(vehicle_no: &str) -> TransferResult<()> {
    let trimmed = vehicle_no.trim();
    if trimmed.len() < 4 || trimmed.len() > 15 {
        return Err(TransferError::validation(
            "vehicle_no",
            "Vehicle number must be 4 to 15 characters",
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return Err(TransferError::validation(
            "vehicle_no",
            "Vehicle number may only contain letters, digits, spaces and dashes",
        ));
    }
    Ok(())
}

// ============================================================================
// Receipt Validations
// ============================================================================

/// Re-weigh figures and unloading quantities of a receipt
pub fn validate_receipt_input(input: &ReceiptInput) -> TransferResult<()> {
    validate_weight("reweigh_gross_kg", input.reweigh_gross_kg)?;
    validate_weight("reweigh_tare_kg", input.reweigh_tare_kg)?;
    for (idx, mismatch) in input.unloading_mismatches.iter().enumerate() {
        let field = format!("unloading_mismatches[{}].qty_delta", idx);
        validate_delta(&field, mismatch.qty_delta)?;
        if mismatch.qty_delta.is_zero() {
            return Err(TransferError::validation(field, "Quantity delta must be non-zero"));
        }
    }
    Ok(())
}

// ============================================================================
// Discrepancy Validations
// ============================================================================

/// Manual lines must target products on the transfer and carry a non-zero delta
pub fn validate_discrepancy_lines(
    lines: &[NewDiscrepancyLine],
    transfer_products: &[Uuid],
) -> TransferResult<()> {
    if lines.is_empty() {
        return Err(TransferError::validation(
            "lines",
            "Discrepancy must have at least one line",
        ));
    }

    for (idx, line) in lines.iter().enumerate() {
        if !transfer_products.contains(&line.product_id) {
            return Err(TransferError::validation(
                format!("lines[{}].product_id", idx),
                format!("Product {} is not on this transfer", line.product_id),
            ));
        }
        let qty = line.qty_delta.unwrap_or_default();
        let weight = line.weight_delta_kg.unwrap_or_default();
        validate_delta(&format!("lines[{}].qty_delta", idx), qty)?;
        validate_delta(&format!("lines[{}].weight_delta_kg", idx), weight)?;
        if qty.is_zero() && weight.is_zero() {
            return Err(TransferError::validation(
                format!("lines[{}]", idx),
                "A discrepancy line needs a non-zero quantity or weight delta",
            ));
        }
    }
    Ok(())
}
