//! Inbound order events

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use shared::error::AppResult;

use crate::dispatch::DispatchOutcome;
use crate::state::AppState;

/// POST /api/dispatch
///
/// The body is the order-created event (object, JSON string, or
/// `{"body": ...}` envelope).
pub async fn handle_dispatch(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<DispatchOutcome>> {
    let outcome = state.dispatcher.dispatch_body(&body).await?;
    Ok(Json(outcome))
}
