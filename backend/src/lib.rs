//! Inter-branch stock transfer server
//!
//! Persists the transfer workflow from the `shared` crate in PostgreSQL and
//! exposes it over HTTP. Collaborators (stock, numbering, events) sit behind
//! traits held in [`AppState`].

use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::PgPool;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;

use services::{
    BroadcastEventSink, EventSink, PgSequenceAllocator, PgStockService, RetryPolicy,
    SequenceAllocator, StockService,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub events: Arc<dyn EventSink>,
    pub stock: Arc<dyn StockService>,
    pub sequence: Arc<dyn SequenceAllocator>,
}

impl AppState {
    /// Postgres-backed collaborators and a broadcast event sink
    pub fn new(db: PgPool, config: Config) -> Self {
        let events: Arc<dyn EventSink> =
            Arc::new(BroadcastEventSink::new(config.events.channel_capacity));
        let stock: Arc<dyn StockService> = Arc::new(PgStockService::new(db.clone()));
        let sequence: Arc<dyn SequenceAllocator> = Arc::new(PgSequenceAllocator::new(
            db.clone(),
            config.sequence.prefix.clone(),
            config.sequence.max_attempts,
        ));

        Self {
            db,
            config: Arc::new(config),
            events,
            stock,
            sequence,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config.transfer)
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Retail Transfer API v1.0"
}

/// Liveness check
async fn health_check() -> &'static str {
    "OK"
}
