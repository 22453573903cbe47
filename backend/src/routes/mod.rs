//! Route definitions for the transfer API

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - transfer lifecycle
        .nest("/transfers", transfer_routes(state.clone()))
        // Protected routes - discrepancy review
        .nest("/discrepancies", discrepancy_routes(state.clone()))
        // Protected routes - branches and stock
        .nest("/branches", branch_routes(state))
}

/// Transfer routes (protected)
fn transfer_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_transfers).post(handlers::create_transfer),
        )
        .route("/:id", get(handlers::get_transfer))
        .route("/:id/approve", post(handlers::approve_transfer))
        .route(
            "/:id/dispatch",
            post(handlers::dispatch_transfer),
        )
        .route("/:id/shipments", get(handlers::list_shipments))
        .route("/:id/reached", post(handlers::mark_reached))
        .route("/:id/receive", post(handlers::receive_transfer))
        .route("/:id/discrepancies", post(handlers::raise_discrepancy))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Discrepancy routes (protected)
fn discrepancy_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:id", get(handlers::get_discrepancy))
        .route("/:id/review", post(handlers::start_review))
        .route("/:id/reopen", post(handlers::reopen_discrepancy))
        .route("/:id/resolve", post(handlers::resolve_discrepancy))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Branch and stock routes (protected)
fn branch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_branches))
        .route(
            "/:branch_id/stock/:product_id",
            get(handlers::get_branch_stock),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
