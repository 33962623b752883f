//! Operator-triggered repair of audit records
//!
//! - `heal`: re-derive order fields of success records from the commerce platform
//! - `fix_dates`: recompute location-local business days
//! - `cleanup_errors`: drop failure records of orders that later succeeded
//!
//! Each operation drains a [`WorkList`] one item at a time into a report, so
//! a failing item is recorded and the batch carries on.

mod service;

pub use service::HealingService;

use std::collections::VecDeque;

use serde::Serialize;

/// Bounded queue of items still to process
#[derive(Debug)]
pub struct WorkList<T> {
    items: VecDeque<T>,
}

impl<T> WorkList<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    pub fn next_item(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

/// One item that could not be processed
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealResult {
    pub order_id: String,
    pub success: bool,
    /// Record fields whose value changed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealReport {
    pub healed: usize,
    pub failed: usize,
    pub results: Vec<HealResult>,
}

impl HealReport {
    pub fn record_healed(&mut self, order_id: &str, changed: Vec<String>) {
        self.healed += 1;
        self.results.push(HealResult {
            order_id: order_id.to_string(),
            success: true,
            changed,
            error: None,
        });
    }

    pub fn record_failed(&mut self, order_id: &str, error: String) {
        self.failed += 1;
        self.results.push(HealResult {
            order_id: order_id.to_string(),
            success: false,
            changed: Vec::new(),
            error: Some(error),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFix {
    pub order_id: String,
    pub from: Option<String>,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixDatesReport {
    pub fixed: usize,
    pub skipped: usize,
    pub fixes: Vec<DateFix>,
    pub errors: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRecord {
    pub pk: String,
    pub sk: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted: usize,
    pub deleted_records: Vec<DeletedRecord>,
    pub errors: Vec<ItemFailure>,
}
