//! WebAssembly module for the receiving-branch screen
//!
//! Provides client-side computation for:
//! - Net weight from weighbridge gross/tare
//! - Variance preview against the shipped weight before a receipt is posted
//! - Transfer status navigation
//!
//! Weights and percentages cross the boundary as decimal strings so the
//! browser sees exactly the numbers the server will compute.

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::reconciliation;
use shared::TransferStatus;

// Re-export shared types for use in JavaScript
pub use shared::models::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::log_1(&JsValue::from_str("retail-transfer-wasm ready"));
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("{} is not a number: {}", field, value))
}

fn net_weight_inner(gross_kg: &str, tare_kg: &str) -> Result<Decimal, String> {
    let gross = parse_decimal("gross_kg", gross_kg)?;
    let tare = parse_decimal("tare_kg", tare_kg)?;
    reconciliation::net_weight(gross, tare).map_err(|e| e.to_string())
}

fn preview_inner(
    shipped_net_kg: &str,
    reweigh_gross_kg: &str,
    reweigh_tare_kg: &str,
    tolerance_percent: &str,
) -> Result<String, String> {
    let shipped = parse_decimal("shipped_net_kg", shipped_net_kg)?;
    let gross = parse_decimal("reweigh_gross_kg", reweigh_gross_kg)?;
    let tare = parse_decimal("reweigh_tare_kg", reweigh_tare_kg)?;
    let tolerance = if tolerance_percent.trim().is_empty() {
        reconciliation::DEFAULT_TOLERANCE_PERCENT
    } else {
        parse_decimal("tolerance_percent", tolerance_percent)?
    };

    let comparison =
        reconciliation::compare(shipped, gross, tare, tolerance).map_err(|e| e.to_string())?;
    serde_json::to_string(&comparison).map_err(|e| e.to_string())
}

fn to_js_error(message: String) -> JsValue {
    web_sys::console::warn_1(&JsValue::from_str(&message));
    JsValue::from_str(&message)
}

/// Net weight (gross - tare) as a decimal string
#[wasm_bindgen]
pub fn net_weight(gross_kg: &str, tare_kg: &str) -> Result<String, JsValue> {
    net_weight_inner(gross_kg, tare_kg)
        .map(|net| net.to_string())
        .map_err(to_js_error)
}

/// Compare a re-weigh against the shipped net weight.
///
/// Returns the comparison as JSON: received net, signed variance, variance
/// ratio (null when nothing was shipped) and whether it is within tolerance.
/// An empty tolerance uses the default policy.
#[wasm_bindgen]
pub fn preview_receipt(
    shipped_net_kg: &str,
    reweigh_gross_kg: &str,
    reweigh_tare_kg: &str,
    tolerance_percent: &str,
) -> Result<String, JsValue> {
    preview_inner(shipped_net_kg, reweigh_gross_kg, reweigh_tare_kg, tolerance_percent)
        .map_err(to_js_error)
}

/// Statuses a transfer can move to next, for enabling action buttons
#[wasm_bindgen]
pub fn next_statuses(status: &str) -> Result<js_sys::Array, JsValue> {
    let status = TransferStatus::from_str(status).map_err(to_js_error)?;
    Ok(status
        .successors()
        .iter()
        .map(|next| JsValue::from_str(next.as_str()))
        .collect())
}
