//! Readiness check

use axum::{extract::State, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub version: &'static str,
    pub environment: String,
    pub database_reachable: bool,
    /// Tolerance applied when a receipt does not carry its own
    pub default_tolerance_percent: Decimal,
}

/// 200 when the database answers, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database_reachable = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => true,
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check could not reach the database");
            false
        }
    };

    let status = if database_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database_reachable,
            version: env!("CARGO_PKG_VERSION"),
            environment: state.config.environment.clone(),
            database_reachable,
            default_tolerance_percent: state.config.transfer.default_tolerance_percent,
        }),
    )
}
