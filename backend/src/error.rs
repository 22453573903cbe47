//! Error handling for the transfer server
//!
//! Domain errors from the workflow engine pass through unchanged; the HTTP
//! layer only decides the status code and the JSON envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::TransferError;
use thiserror::Error;
use uuid::Uuid;

/// Postgres SQLSTATEs that mean "another writer got there first"
const CONFLICT_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] TransferError),

    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Permission denied: requires {0}")]
    Forbidden(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Optimistic-lock failures can be retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Domain(e) if e.is_retryable())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(err) => match err {
                TransferError::Validation { .. } | TransferError::InvalidWeight { .. } => {
                    StatusCode::BAD_REQUEST
                }
                TransferError::NotFound { .. } => StatusCode::NOT_FOUND,
                TransferError::InvalidState { .. }
                | TransferError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
                TransferError::SequenceExhaustion { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::DatabaseError(_)
            | AppError::Internal(_)
            | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Domain(err) => err.code(),
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) | AppError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Body sent to the client. Server-side failures are not described.
    pub fn detail(&self) -> ErrorDetail {
        let mut detail = ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
            field: None,
            entity_id: None,
            status: None,
        };

        match self {
            AppError::Domain(TransferError::Validation { field, .. }) => {
                detail.field = Some(field.clone());
            }
            AppError::Domain(TransferError::InvalidState { id, status, .. }) => {
                detail.entity_id = Some(*id);
                detail.status = Some(status.clone());
            }
            AppError::Domain(TransferError::NotFound { id, .. })
            | AppError::Domain(TransferError::ConcurrencyConflict { transfer_id: id, .. }) => {
                detail.entity_id = Some(*id);
            }
            AppError::DatabaseError(_) => {
                detail.message = "A database error occurred".to_string();
            }
            AppError::InternalError(_) => {
                detail.message = "An internal server error occurred".to_string();
            }
            _ => {}
        }
        detail
    }
}

/// True when the database rejected a write because of a concurrent writer
pub fn is_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| CONFLICT_SQLSTATES.contains(&code.as_ref())),
        _ => false,
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize, Debug)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(code = self.code(), "Error: {:?}", self);
        } else {
            tracing::warn!(code = self.code(), "{}", self);
        }

        (status, Json(ErrorResponse { error: self.detail() })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_status_codes() {
        let id = Uuid::new_v4();
        let cases = [
            (TransferError::validation("lines", "empty"), StatusCode::BAD_REQUEST),
            (
                TransferError::InvalidWeight {
                    gross_kg: 1.into(),
                    tare_kg: 2.into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                TransferError::NotFound {
                    entity: "transfer",
                    id,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                TransferError::InvalidState {
                    entity: "transfer",
                    id,
                    status: "completed".into(),
                    action: "receive",
                },
                StatusCode::CONFLICT,
            ),
            (
                TransferError::ConcurrencyConflict {
                    transfer_id: id,
                    expected_version: 3,
                },
                StatusCode::CONFLICT,
            ),
            (
                TransferError::SequenceExhaustion {
                    order_type: "branch_request".into(),
                    year: 2025,
                    attempts: 5,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(AppError::from(err).status_code(), expected);
        }
    }

    #[test]
    fn test_invalid_state_detail_carries_entity_and_status() {
        let id = Uuid::new_v4();
        let detail = AppError::from(TransferError::InvalidState {
            entity: "transfer",
            id,
            status: "completed".into(),
            action: "receive",
        })
        .detail();

        assert_eq!(detail.code, "INVALID_STATE");
        assert_eq!(detail.entity_id, Some(id));
        assert_eq!(detail.status.as_deref(), Some("completed"));
        assert!(detail.message.contains("completed"));
    }

    #[test]
    fn test_database_detail_is_opaque() {
        let detail = AppError::DatabaseError(sqlx::Error::RowNotFound).detail();
        assert_eq!(detail.code, "DATABASE_ERROR");
        assert_eq!(detail.message, "A database error occurred");
    }

    #[test]
    fn test_only_conflicts_are_retryable() {
        let conflict = AppError::from(TransferError::ConcurrencyConflict {
            transfer_id: Uuid::new_v4(),
            expected_version: 0,
        });
        assert!(conflict.is_retryable());
        assert!(!AppError::Forbidden("transfers:approve".into()).is_retryable());
        assert!(!is_conflict(&sqlx::Error::RowNotFound));
    }
}
