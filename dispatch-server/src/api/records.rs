//! Audit record read path

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use shared::audit::AnnotatedRecord;
use shared::error::{AppError, AppResult, ErrorCode};

use crate::state::AppState;

/// Hard cap on one page of records
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Location-local day `YYYY-MM-DD`
    pub date: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecordsResponse {
    pub count: usize,
    pub records: Vec<AnnotatedRecord>,
}

impl From<Vec<AnnotatedRecord>> for RecordsResponse {
    fn from(records: Vec<AnnotatedRecord>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

/// GET /api/records?date=&limit=
pub async fn list_records(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<RecordsResponse>> {
    let date = query.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
    if let Some(d) = date
        && chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err()
    {
        return Err(AppError::with_message(
            ErrorCode::InvalidFormat,
            format!("date must be YYYY-MM-DD, got {d}"),
        ));
    }
    let limit = query.limit.unwrap_or(MAX_LIMIT).min(MAX_LIMIT);

    let store = state.store.clone();
    let date = date.map(String::from);
    let records = tokio::task::spawn_blocking(move || store.list(date.as_deref(), Some(limit)))
        .await
        .map_err(|e| AppError::internal(format!("record listing failed: {e}")))??;
    Ok(Json(records.into()))
}

/// GET /api/records/{order_id}
pub async fn order_records(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> AppResult<Json<RecordsResponse>> {
    let store = state.store.clone();
    let id = order_id.clone();
    let records = tokio::task::spawn_blocking(move || store.records_for_order(&id))
        .await
        .map_err(|e| AppError::internal(format!("record lookup failed: {e}")))??;
    if records.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::DispatchRecordNotFound,
            format!("No dispatch records for order {order_id}"),
        )
        .with_detail("orderId", order_id));
    }
    let records: Vec<AnnotatedRecord> = records.into_iter().map(AnnotatedRecord::from).collect();
    Ok(Json(records.into()))
}
