//! Health check endpoint

use axum::Json;
use axum::extract::State;

use crate::ledger::StorageError;
use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let store = state.store.clone();
    let stats = tokio::task::spawn_blocking(move || store.stats())
        .await
        .unwrap_or_else(|e| Err(StorageError::Task(e.to_string())));
    let (status, records) = match stats {
        Ok(stats) => ("ok", serde_json::to_value(stats).unwrap_or_default()),
        Err(e) => {
            tracing::error!(error = %e, "Audit store unavailable");
            ("degraded", serde_json::Value::Null)
        }
    };
    Json(serde_json::json!({
        "status": status,
        "service": "dispatch-server",
        "version": env!("CARGO_PKG_VERSION"),
        "records": records,
    }))
}
