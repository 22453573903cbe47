//! Domain error kinds for the transfer and reconciliation engine
//!
//! Every error carries enough context (entity id, current status) to be
//! surfaced verbatim to the user-facing layer.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by transfer workflow operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Cannot {action} {entity} {id} while it is {status}")]
    InvalidState {
        entity: &'static str,
        id: Uuid,
        status: String,
        action: &'static str,
    },

    #[error("Gross weight {gross_kg} kg is less than tare weight {tare_kg} kg")]
    InvalidWeight { gross_kg: Decimal, tare_kg: Decimal },

    #[error("Transfer {transfer_id} was modified concurrently (expected version {expected_version})")]
    ConcurrencyConflict {
        transfer_id: Uuid,
        expected_version: i64,
    },

    #[error("Sequence for {order_type}/{year} could not be allocated after {attempts} attempts")]
    SequenceExhaustion {
        order_type: String,
        year: i32,
        attempts: u32,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
}

impl TransferError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TransferError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::Validation { .. } => "VALIDATION_ERROR",
            TransferError::InvalidState { .. } => "INVALID_STATE",
            TransferError::InvalidWeight { .. } => "INVALID_WEIGHT",
            TransferError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            TransferError::SequenceExhaustion { .. } => "SEQUENCE_EXHAUSTED",
            TransferError::NotFound { .. } => "NOT_FOUND",
        }
    }

    /// Only optimistic-lock failures are retried by the calling layer
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::ConcurrencyConflict { .. })
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
