//! Audit record construction and writes
//!
//! One success record per order (`SHOPIFY#<order id>`), one failure record
//! per failed attempt (`ERROR#<millis>`). Failure records are never updated.
//! A redelivered order merges into its success record: the first dispatch's
//! creation instant, business dates, heal stamp and delivery job are kept.

use rust_decimal::Decimal;
use shared::audit::{self, AuditLineItem, AuditProperty};
use shared::money::{line_total, round_money, sum_money};
use shared::order::ShippingLine;
use shared::util::local_date;
use shared::{
    DeliveryType, DispatchAuditRecord, DispatchStatus, FeeBreakdown, LocationConfig, OrderEvent,
};

use super::delivery::DeliveryResult;
use super::pos::PosResult;
use crate::ledger::{AuditStore, StorageError, StorageResult};

/// Shipping-line words that mean a local delivery rather than a carrier
const LOCAL_DELIVERY_TERMS: &[&str] = &["delivery", "local", "courier", "uber", "doordash"];

/// Collision retries for failure keys written in the same millisecond
const MAX_FAILURE_KEY_PROBES: i64 = 16;

/// `local` iff any shipping line's title, code or source names a local delivery
pub fn classify_delivery(lines: &[ShippingLine]) -> DeliveryType {
    let is_local = lines.iter().any(|line| {
        [Some(line.title.as_str()), line.code.as_deref(), line.source.as_deref()]
            .into_iter()
            .flatten()
            .map(str::to_lowercase)
            .any(|text| LOCAL_DELIVERY_TERMS.iter().any(|term| text.contains(term)))
    });
    if is_local {
        DeliveryType::Local
    } else {
        DeliveryType::Shipping
    }
}

/// Σ unit price × quantity over the order lines
pub fn compute_subtotal(event: &OrderEvent) -> Decimal {
    round_money(sum_money(
        event
            .line_items
            .iter()
            .map(|li| line_total(li.price, li.quantity)),
    ))
}

/// Σ shipping line prices
pub fn compute_shipping(event: &OrderEvent) -> Decimal {
    round_money(sum_money(event.shipping_lines.iter().map(|s| s.price)))
}

pub fn audit_line_items(event: &OrderEvent) -> Vec<AuditLineItem> {
    event
        .line_items
        .iter()
        .map(|li| AuditLineItem {
            name: li.display_name(),
            sku: li.sku.clone().filter(|s| !s.is_empty()),
            quantity: li.quantity,
            price: li.price,
            properties: li
                .visible_properties()
                .map(|p| AuditProperty {
                    name: p.name.clone(),
                    value: p.value.clone(),
                })
                .collect(),
            modifiers: li.modifiers().into_iter().map(|m| m.name).collect(),
        })
        .collect()
}

/// Overwrite every field derived from the commerce order
///
/// Used by both the dispatch path and healing, so a healed record matches
/// what a fresh dispatch would have written.
pub fn apply_order_fields(record: &mut DispatchAuditRecord, event: &OrderEvent) {
    let subtotal = compute_subtotal(event);
    let shipping = compute_shipping(event);
    let name = event.customer_name();

    record.order_number = event.display_number();
    record.customer_name = (!name.is_empty()).then_some(name);
    record.customer_email = event.customer_email();
    record.customer_phone = event.customer_phone();
    record.shipping_address = event.shipping_address.clone();
    record.delivery_type = Some(classify_delivery(&event.shipping_lines));
    record.subtotal = subtotal;
    record.shipping = shipping;
    record.total = if event.total_price > Decimal::ZERO {
        round_money(event.total_price)
    } else {
        subtotal.saturating_add(shipping)
    };
    record.currency = Some(event.currency.clone());
    record.line_items = audit_line_items(event);
}

/// Overwrite the location identity fields
pub fn apply_location_fields(record: &mut DispatchAuditRecord, location: &LocationConfig) {
    record.location_name = Some(location.name.clone());
    record.location_id = location.location_id.clone();
    record.time_zone = Some(location.time_zone.name().to_string());
}

/// Set `date` and `location_date` from a creation instant
pub fn apply_dates(record: &mut DispatchAuditRecord, created_at: i64, tz: chrono_tz::Tz) {
    record.date = local_date(created_at, tz);
    record.location_date = match (&record.pos_location_id, &record.date) {
        (Some(pos), Some(date)) if !pos.is_empty() => Some(audit::location_date_key(pos, date)),
        _ => None,
    };
}

fn blank_record(order_id: &str, sk: String, status: DispatchStatus) -> DispatchAuditRecord {
    DispatchAuditRecord {
        pk: audit::partition_key(order_id),
        sk,
        order_id: order_id.to_string(),
        order_number: String::new(),
        status,
        pos_order_id: None,
        payment_id: None,
        delivery_order_id: None,
        location_name: None,
        location_id: None,
        pos_location_id: None,
        time_zone: None,
        customer_name: None,
        customer_email: None,
        customer_phone: None,
        shipping_address: None,
        delivery_type: None,
        subtotal: Decimal::ZERO,
        shipping: Decimal::ZERO,
        total: Decimal::ZERO,
        gross: None,
        fee: None,
        net: None,
        fee_transaction_id: None,
        currency: None,
        line_items: Vec::new(),
        date: None,
        location_date: None,
        created_at: None,
        updated_at: None,
        healed_at: None,
        error_message: None,
        error_stack: None,
    }
}

/// Everything a success record needs from a completed dispatch
pub struct SuccessEntry<'a> {
    pub event: &'a OrderEvent,
    pub location: &'a LocationConfig,
    pub fee: &'a FeeBreakdown,
    pub pos: &'a PosResult,
    pub delivery: Option<&'a DeliveryResult>,
    pub now_millis: i64,
}

pub fn success_record(entry: &SuccessEntry<'_>) -> Option<DispatchAuditRecord> {
    if entry.pos.pos_order_id.trim().is_empty() {
        return None;
    }
    let order_id = entry.event.order_id();
    let status = if entry.delivery.is_some() {
        DispatchStatus::Dispatched
    } else {
        DispatchStatus::PosOnly
    };

    let mut record = blank_record(order_id, audit::success_sort_key(order_id), status);
    apply_order_fields(&mut record, entry.event);
    apply_location_fields(&mut record, entry.location);
    record.pos_location_id = Some(entry.location.pos_location_id.clone());
    record.pos_order_id = Some(entry.pos.pos_order_id.clone());
    record.payment_id = Some(entry.pos.payment_id.clone()).filter(|p| !p.is_empty());
    record.delivery_order_id = entry.delivery.map(|d| d.delivery_order_id.clone());
    record.gross = Some(entry.fee.gross());
    record.fee = Some(entry.fee.fee());
    record.net = Some(entry.fee.net());
    record.fee_transaction_id = entry.fee.transaction_id().map(String::from);
    record.created_at = Some(entry.now_millis);
    record.updated_at = Some(entry.now_millis);
    apply_dates(&mut record, entry.now_millis, entry.location.time_zone);
    Some(record)
}

/// Everything a failure record needs
pub struct FailureEntry<'a> {
    pub event: &'a OrderEvent,
    pub location: &'a LocationConfig,
    pub message: &'a str,
    pub stack: &'a str,
    pub now_millis: i64,
}

pub fn failure_record(entry: &FailureEntry<'_>) -> DispatchAuditRecord {
    let order_id = entry.event.order_id();
    let mut record = blank_record(
        order_id,
        audit::error_sort_key(entry.now_millis),
        DispatchStatus::Failed,
    );
    apply_order_fields(&mut record, entry.event);
    apply_location_fields(&mut record, entry.location);
    record.pos_location_id =
        Some(entry.location.pos_location_id.clone()).filter(|p| !p.trim().is_empty());
    record.created_at = Some(entry.now_millis);
    record.updated_at = Some(entry.now_millis);
    record.error_message = Some(entry.message.to_string());
    record.error_stack = Some(entry.stack.to_string());
    apply_dates(&mut record, entry.now_millis, entry.location.time_zone);
    record
}

/// Keep what an earlier dispatch of the same order established
fn merge_replay(record: &mut DispatchAuditRecord, existing: DispatchAuditRecord) {
    if existing.created_at.is_some() {
        record.created_at = existing.created_at;
        record.date = existing.date;
        record.location_date = existing.location_date;
    }
    record.healed_at = existing.healed_at;
    if record.delivery_order_id.is_none() && existing.delivery_order_id.is_some() {
        record.delivery_order_id = existing.delivery_order_id;
        record.status = DispatchStatus::Dispatched;
    }
    if record.payment_id.is_none() {
        record.payment_id = existing.payment_id;
    }
}

/// Writes audit records; never deletes
#[derive(Clone)]
pub struct LedgerWriter {
    store: AuditStore,
}

impl LedgerWriter {
    pub fn new(store: AuditStore) -> Self {
        Self { store }
    }

    /// Write (or merge) a success record, returning what was stored
    pub fn write_success(&self, record: DispatchAuditRecord) -> StorageResult<DispatchAuditRecord> {
        let record = self.store.upsert(record, merge_replay)?;
        tracing::debug!(order_id = %record.order_id, status = ?record.status, "Success record written");
        Ok(record)
    }

    /// Write a new failure record under a fresh `ERROR#<millis>` key
    pub fn write_failure(&self, mut record: DispatchAuditRecord) -> StorageResult<DispatchAuditRecord> {
        let base = record.created_at.unwrap_or_default();
        for probe in 1..=MAX_FAILURE_KEY_PROBES {
            if self.store.insert_new(&record)? {
                tracing::debug!(order_id = %record.order_id, sk = %record.sk, "Failure record written");
                return Ok(record);
            }
            record.sk = audit::error_sort_key(base + probe);
        }
        // Every probed key taken; keep the last candidate rather than lose the failure
        self.store.put(&record)?;
        Ok(record)
    }

    /// [`Self::write_success`] on the blocking pool
    pub async fn record_success(&self, record: DispatchAuditRecord) -> StorageResult<DispatchAuditRecord> {
        let writer = self.clone();
        run_blocking(move || writer.write_success(record)).await
    }

    /// [`Self::write_failure`] on the blocking pool
    pub async fn record_failure(&self, record: DispatchAuditRecord) -> StorageResult<DispatchAuditRecord> {
        let writer = self.clone();
        run_blocking(move || writer.write_failure(record)).await
    }
}

async fn run_blocking<T, F>(f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(StorageError::Task(e.to_string())))
}
