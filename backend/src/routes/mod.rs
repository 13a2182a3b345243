//! Route definitions for the pharmacy shift bot servers

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Routes served by the store bot process
pub fn store_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Store webhook (public - called by the LINE platform)
        .route("/store/webhook", post(handlers::handle_store_webhook))
}

/// Routes served by the pharmacist bot process
pub fn pharmacist_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Pharmacist webhook (public - called by the LINE platform)
        .route(
            "/pharmacist/line/webhook",
            post(handlers::handle_pharmacist_webhook),
        )
}
