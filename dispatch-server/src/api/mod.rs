//! API routes for dispatch-server

pub mod admin;
pub mod dispatch;
pub mod health;
pub mod records;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Order intake (event source)
    let intake = Router::new().route("/api/dispatch", post(dispatch::handle_dispatch));

    // Operator surface
    let operator = Router::new()
        .route("/api/admin", post(admin::handle_admin))
        .route("/api/records", get(records::list_records))
        .route("/api/records/{order_id}", get(records::order_records));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(intake)
        .merge(operator)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
