//! Operator actions (action-dispatch style)

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use shared::error::{AppError, AppResult, ErrorCode};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminRequest {
    pub action: String,
    #[serde(default)]
    pub order_ids: Option<Vec<String>>,
    #[serde(default)]
    pub order_id: Option<String>,
}

impl AdminRequest {
    /// `orderIds` when given, else the single `orderId`
    fn target_ids(&self) -> Vec<String> {
        let ids = match (&self.order_ids, &self.order_id) {
            (Some(ids), _) if !ids.is_empty() => ids.clone(),
            (_, Some(id)) => vec![id.clone()],
            _ => Vec::new(),
        };
        ids.into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect()
    }
}

/// POST /api/admin
pub async fn handle_admin(
    State(state): State<AppState>,
    Json(req): Json<AdminRequest>,
) -> AppResult<Response> {
    tracing::info!(action = %req.action, "Admin action");
    match req.action.as_str() {
        "heal" => {
            let ids = req.target_ids();
            if ids.is_empty() {
                return Err(AppError::validation("heal requires orderIds or orderId"));
            }
            let report = state.healing.heal(ids).await;
            Ok(Json(report).into_response())
        }
        "fixDates" => {
            let healing = state.healing.clone();
            let report = tokio::task::spawn_blocking(move || healing.fix_dates())
                .await
                .map_err(|e| AppError::internal(format!("fixDates task failed: {e}")))??;
            Ok(Json(report).into_response())
        }
        "cleanupErrors" => {
            let healing = state.healing.clone();
            let report = tokio::task::spawn_blocking(move || healing.cleanup_errors())
                .await
                .map_err(|e| AppError::internal(format!("cleanupErrors task failed: {e}")))??;
            Ok(Json(report).into_response())
        }
        other => Err(AppError::with_message(
            ErrorCode::UnknownAction,
            format!("Unknown action: {other}"),
        )
        .with_detail("supported", vec!["heal", "fixDates", "cleanupErrors"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> AdminRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_target_ids() {
        let req = request(serde_json::json!({"action": "heal", "orderIds": ["1", " 2 ", ""]}));
        assert_eq!(req.target_ids(), ["1", "2"]);

        let req = request(serde_json::json!({"action": "heal", "orderId": "7"}));
        assert_eq!(req.target_ids(), ["7"]);

        let req = request(serde_json::json!({"action": "heal", "orderIds": [], "orderId": "8"}));
        assert_eq!(req.target_ids(), ["8"]);

        let req = request(serde_json::json!({"action": "heal"}));
        assert!(req.target_ids().is_empty());
    }
}
