use std::collections::BTreeMap;
use std::sync::Arc;

use chrono_tz::Tz;
use serde_json::Value;
use shared::audit::location_date_key;
use shared::util::{local_date, now_millis, parse_time_zone};
use shared::{DispatchAuditRecord, RecordKind};

use super::{
    CleanupReport, DateFix, DeletedRecord, FixDatesReport, HealReport, ItemFailure, WorkList,
};
use crate::clients::CommercePlatform;
use crate::dispatch::ledger::apply_order_fields;
use crate::error::error_chain;
use crate::ledger::{AuditStore, StorageResult};

/// Bookkeeping fields ignored when reporting what a heal changed
const BOOKKEEPING_FIELDS: &[&str] = &["updatedAt", "healedAt"];

pub struct HealingService {
    commerce: Arc<dyn CommercePlatform>,
    store: AuditStore,
    /// Used for records that carry no time zone of their own
    default_time_zone: Tz,
}

impl HealingService {
    pub fn new(commerce: Arc<dyn CommercePlatform>, store: AuditStore, default_time_zone: Tz) -> Self {
        Self {
            commerce,
            store,
            default_time_zone,
        }
    }

    // ========== heal ==========

    /// Re-derive order fields of each order's success record
    ///
    /// POS, payment and delivery ids, fee figures, status, dates and
    /// `created_at` are left as dispatched.
    pub async fn heal(&self, order_ids: Vec<String>) -> HealReport {
        let mut work = WorkList::new(order_ids);
        let mut report = HealReport::default();
        tracing::info!(count = work.remaining(), "Healing records");

        while let Some(order_id) = work.next_item() {
            match self.heal_one(&order_id).await {
                Ok(changed) => {
                    tracing::info!(order_id = %order_id, changed = ?changed, "Record healed");
                    report.record_healed(&order_id, changed);
                }
                Err(error) => {
                    tracing::warn!(order_id = %order_id, error = %error, "Heal failed");
                    report.record_failed(&order_id, error);
                }
            }
        }
        report
    }

    async fn heal_one(&self, order_id: &str) -> Result<Vec<String>, String> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err("empty order id".into());
        }
        let before = self
            .store
            .get_success(order_id)
            .map_err(|e| error_chain(&e))?
            .ok_or_else(|| "no success record".to_string())?;

        let event = self
            .commerce
            .fetch_order(order_id)
            .await
            .map_err(|e| format!("order lookup: {}", error_chain(&e)))?;
        let assignment = self
            .commerce
            .fulfillment_assignment(order_id)
            .await
            .map_err(|e| format!("fulfillment lookup: {}", error_chain(&e)))?;

        let mut record = before.clone();
        apply_order_fields(&mut record, &event);
        if let Some(assignment) = assignment {
            record.location_id = Some(assignment.location_id);
            if let Some(name) = assignment.name {
                record.location_name = Some(name);
            }
        }
        let now = now_millis();
        record.healed_at = Some(now);
        record.updated_at = Some(now);

        self.store.put(&record).map_err(|e| error_chain(&e))?;
        Ok(changed_fields(&before, &record))
    }

    // ========== fixDates ==========

    /// Recompute `date` (and `locationDate`) of success records from `createdAt`
    ///
    /// Records without `createdAt` are not considered. Records whose date is
    /// already right are counted as skipped.
    pub fn fix_dates(&self) -> StorageResult<FixDatesReport> {
        let candidates = self
            .store
            .scan_all()?
            .into_iter()
            .filter(|r| r.kind() == RecordKind::Success && r.created_at.is_some());
        let mut work = WorkList::new(candidates);
        let mut report = FixDatesReport::default();
        tracing::info!(count = work.remaining(), "Fixing record dates");

        while let Some(record) = work.next_item() {
            let order_id = record.order_id.clone();
            match self.fix_one(record) {
                Ok(Some(fix)) => {
                    tracing::info!(order_id = %order_id, from = ?fix.from, to = %fix.to, "Record date fixed");
                    report.fixed += 1;
                    report.fixes.push(fix);
                }
                Ok(None) => report.skipped += 1,
                Err(error) => {
                    tracing::warn!(order_id = %order_id, error = %error, "Date fix failed");
                    report.errors.push(ItemFailure {
                        id: order_id,
                        error,
                    });
                }
            }
        }
        Ok(report)
    }

    fn fix_one(&self, mut record: DispatchAuditRecord) -> Result<Option<DateFix>, String> {
        let created_at = record.created_at.ok_or("no createdAt")?;
        let tz = record
            .time_zone
            .as_deref()
            .and_then(parse_time_zone)
            .unwrap_or(self.default_time_zone);
        let expected = local_date(created_at, tz)
            .ok_or_else(|| format!("createdAt {created_at} out of range"))?;

        if record.date.as_deref() == Some(expected.as_str()) {
            return Ok(None);
        }

        let from = record.date.replace(expected.clone());
        if let Some(pos) = record.pos_location_id.as_deref().filter(|p| !p.is_empty()) {
            record.location_date = Some(location_date_key(pos, &expected));
        }
        record.updated_at = Some(now_millis());
        self.store.put(&record).map_err(|e| error_chain(&e))?;

        Ok(Some(DateFix {
            order_id: record.order_id,
            from,
            to: expected,
        }))
    }

    // ========== cleanupErrors ==========

    /// Delete failure records of every order that also has a success record
    pub fn cleanup_errors(&self) -> StorageResult<CleanupReport> {
        #[derive(Default)]
        struct Group {
            has_success: bool,
            errors: Vec<(String, String)>,
        }

        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for record in self.store.scan_all()? {
            let group = groups.entry(record.pk.clone()).or_default();
            match record.kind() {
                RecordKind::Success => group.has_success = true,
                RecordKind::Error => group.errors.push((record.pk, record.sk)),
                RecordKind::Metadata => {}
            }
        }

        let stale = groups
            .into_values()
            .filter(|g| g.has_success)
            .flat_map(|g| g.errors);
        let mut work = WorkList::new(stale);
        let mut report = CleanupReport::default();
        tracing::info!(count = work.remaining(), "Cleaning up superseded failure records");

        while let Some((pk, sk)) = work.next_item() {
            match self.store.delete(&pk, &sk) {
                Ok(true) => {
                    report.deleted += 1;
                    report.deleted_records.push(DeletedRecord { pk, sk });
                }
                Ok(false) => tracing::debug!(pk = %pk, sk = %sk, "Failure record already gone"),
                Err(e) => {
                    tracing::warn!(pk = %pk, sk = %sk, error = %e, "Failed to delete failure record");
                    report.errors.push(ItemFailure {
                        id: format!("{pk}/{sk}"),
                        error: error_chain(&e),
                    });
                }
            }
        }
        tracing::info!(deleted = report.deleted, "Cleanup complete");
        Ok(report)
    }
}

/// Top-level record fields (camelCase) whose JSON value differs
fn changed_fields(before: &DispatchAuditRecord, after: &DispatchAuditRecord) -> Vec<String> {
    let (Ok(Value::Object(before)), Ok(Value::Object(after))) =
        (serde_json::to_value(before), serde_json::to_value(after))
    else {
        return Vec::new();
    };
    after
        .iter()
        .filter(|(key, _)| !BOOKKEEPING_FIELDS.contains(&key.as_str()))
        .filter(|(key, value)| before.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fakes::FakeCommerce;
    use crate::dispatch::delivery::DeliveryResult;
    use crate::dispatch::ledger::{
        FailureEntry, LedgerWriter, SuccessEntry, failure_record, success_record,
    };
    use crate::dispatch::pos::PosResult;
    use rust_decimal::Decimal;
    use serde_json::json;
    use shared::{FeeBreakdown, LocationConfig, OrderEvent};

    // 2025-01-15T23:30:00Z
    const CREATED: i64 = 1_736_983_800_000;
    // 2025-01-16T01:30:00Z (still the 15th in New York)
    const CREATED_LATE: i64 = 1_736_991_000_000;

    fn location() -> LocationConfig {
        LocationConfig {
            location_id: Some("gid-1".into()),
            pos_location_id: "POS-1".into(),
            delivery_api_key: Some("key".into()),
            name: "Downtown".into(),
            time_zone: chrono_tz::America::New_York,
        }
    }

    fn order(id: &str, first_name: &str) -> OrderEvent {
        serde_json::from_value(json!({
            "id": id,
            "order_number": 1000,
            "total_price": "10.00",
            "line_items": [{"title": "Latte", "quantity": 1, "price": "10.00"}],
            "shipping_address": {"first_name": first_name, "last_name": "Lovelace"}
        }))
        .unwrap()
    }

    fn seed_success(store: &AuditStore, id: &str, created_at: i64) -> DispatchAuditRecord {
        let ev = order(id, "Ada");
        let loc = location();
        let fee = FeeBreakdown::new("10.00".parse().unwrap(), "0.59".parse().unwrap(), None);
        let pos = PosResult {
            pos_order_id: format!("sq-order-{id}"),
            payment_id: format!("sq-pay-{id}"),
            total_minor: 1000,
        };
        let delivery = DeliveryResult {
            delivery_order_id: format!("dlv-{id}"),
            status: None,
        };
        let record = success_record(&SuccessEntry {
            event: &ev,
            location: &loc,
            fee: &fee,
            pos: &pos,
            delivery: Some(&delivery),
            now_millis: created_at,
        })
        .unwrap();
        store.put(&record).unwrap();
        record
    }

    fn seed_failure(store: &AuditStore, id: &str, at: i64) {
        let ev = order(id, "Ada");
        let loc = location();
        LedgerWriter::new(store.clone())
            .write_failure(failure_record(&FailureEntry {
                event: &ev,
                location: &loc,
                message: "pos_order failed",
                stack: "pos_order failed",
                now_millis: at,
            }))
            .unwrap();
    }

    fn service(commerce: FakeCommerce, store: &AuditStore) -> HealingService {
        HealingService::new(Arc::new(commerce), store.clone(), chrono_tz::America::New_York)
    }

    #[tokio::test]
    async fn test_heal_overwrites_order_fields_only() {
        let store = AuditStore::open_in_memory().unwrap();
        let original = seed_success(&store, "42", CREATED);

        let mut fresh = order("42", "Grace");
        fresh.line_items[0].quantity = 2;
        let commerce = FakeCommerce::new()
            .with_order(fresh)
            .with_assignment("gid-9", "Uptown");

        let report = service(commerce, &store).heal(vec!["42".into()]).await;
        assert_eq!(report.healed, 1);
        assert_eq!(report.failed, 0);
        assert!(report.results[0].changed.contains(&"customerName".to_string()));
        assert!(report.results[0].changed.contains(&"locationName".to_string()));

        let healed = store.get_success("42").unwrap().unwrap();
        assert_eq!(healed.customer_name.as_deref(), Some("Grace Lovelace"));
        assert_eq!(healed.subtotal, "20.00".parse::<Decimal>().unwrap());
        assert_eq!(healed.location_name.as_deref(), Some("Uptown"));
        assert_eq!(healed.location_id.as_deref(), Some("gid-9"));
        assert!(healed.healed_at.is_some());

        assert_eq!(healed.pos_order_id, original.pos_order_id);
        assert_eq!(healed.payment_id, original.payment_id);
        assert_eq!(healed.delivery_order_id, original.delivery_order_id);
        assert_eq!(healed.created_at, original.created_at);
        assert_eq!(healed.fee, original.fee);
        assert_eq!(healed.status, original.status);
    }

    #[tokio::test]
    async fn test_heal_collects_item_failures() {
        let store = AuditStore::open_in_memory().unwrap();
        seed_success(&store, "42", CREATED);
        seed_success(&store, "43", CREATED);
        // 43 has a record but the commerce platform no longer knows it
        let commerce = FakeCommerce::new().with_order(order("42", "Ada"));

        let report = service(commerce, &store)
            .heal(vec!["42".into(), "43".into(), "44".into()])
            .await;
        assert_eq!(report.healed, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(report.results[1].order_id, "43");
        assert!(report.results[1].error.as_deref().unwrap().contains("order lookup"));
        assert_eq!(report.results[2].error.as_deref(), Some("no success record"));
    }

    #[test]
    fn test_fix_dates_rewrites_only_wrong_dates() {
        let store = AuditStore::open_in_memory().unwrap();

        // Stored with the UTC day instead of the New York day
        let mut wrong = seed_success(&store, "1", CREATED_LATE);
        wrong.date = Some("2025-01-16".into());
        wrong.location_date = Some("POS-1#2025-01-16".into());
        store.put(&wrong).unwrap();

        seed_success(&store, "2", CREATED);

        let mut no_created = seed_success(&store, "3", CREATED);
        no_created.created_at = None;
        no_created.date = Some("1999-01-01".into());
        store.put(&no_created).unwrap();

        seed_failure(&store, "4", CREATED_LATE);

        let report = service(FakeCommerce::new(), &store).fix_dates().unwrap();
        assert_eq!(report.fixed, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.errors.is_empty());
        assert_eq!(
            report.fixes[0],
            DateFix {
                order_id: "1".into(),
                from: Some("2025-01-16".into()),
                to: "2025-01-15".into(),
            }
        );

        let fixed = store.get_success("1").unwrap().unwrap();
        assert_eq!(fixed.date.as_deref(), Some("2025-01-15"));
        assert_eq!(fixed.location_date.as_deref(), Some("POS-1#2025-01-15"));
        let untouched = store.get_success("3").unwrap().unwrap();
        assert_eq!(untouched.date.as_deref(), Some("1999-01-01"));
    }

    #[test]
    fn test_cleanup_only_touches_orders_with_success() {
        let store = AuditStore::open_in_memory().unwrap();
        seed_success(&store, "42", CREATED);
        seed_failure(&store, "42", CREATED - 2_000);
        seed_failure(&store, "42", CREATED - 1_000);
        seed_failure(&store, "77", CREATED);

        let report = service(FakeCommerce::new(), &store).cleanup_errors().unwrap();
        assert_eq!(report.deleted, 2);
        assert!(report.errors.is_empty());
        assert!(report.deleted_records.iter().all(|r| r.pk == "ORDER#42"));

        let remaining = store.records_for_order("42").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind(), RecordKind::Success);
        assert_eq!(store.records_for_order("77").unwrap().len(), 1);

        let again = service(FakeCommerce::new(), &store).cleanup_errors().unwrap();
        assert_eq!(again.deleted, 0);
    }
}
