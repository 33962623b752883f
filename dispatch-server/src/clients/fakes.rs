//! In-memory collaborators for tests
//!
//! `FakePos` deduplicates by idempotency key the way Square does: a replayed
//! key returns the original response without creating anything.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::OrderEvent;

use super::ClientError;
use super::commerce::{CommercePlatform, FulfillmentAssignment, LocationMetadata, Transaction};
use super::delivery::{DeliveryJob, DeliveryReceipt, DeliveryService};
use super::pos::{
    CreateOrderRequest, CreatePaymentRequest, FulfillmentRef, Money, PosOrder, PosPayment,
    PosSystem, UpdateOrderRequest,
};

fn unavailable(service: &'static str) -> ClientError {
    ClientError::Status {
        service,
        status: 503,
        body: "service unavailable".into(),
    }
}

// ========== Commerce ==========

#[derive(Default)]
pub struct FakeCommerce {
    assignment: Mutex<Option<FulfillmentAssignment>>,
    metadata: Mutex<HashMap<String, LocationMetadata>>,
    transactions: Mutex<Vec<Transaction>>,
    orders: Mutex<HashMap<String, OrderEvent>>,
    fail_assignment: Mutex<bool>,
    fail_metadata: Mutex<bool>,
    fail_transactions: Mutex<bool>,
}

impl FakeCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_assignment(self, location_id: &str, name: &str) -> Self {
        *self.assignment.lock() = Some(FulfillmentAssignment {
            location_id: location_id.into(),
            name: Some(name.into()),
        });
        self
    }

    pub fn with_metadata(self, location_id: &str, pos_location_id: &str, api_key: &str) -> Self {
        self.metadata.lock().insert(
            location_id.into(),
            LocationMetadata {
                pos_location_id: Some(pos_location_id.into()),
                delivery_api_key: Some(api_key.into()),
                time_zone: None,
            },
        );
        self
    }

    pub fn with_location_metadata(self, location_id: &str, meta: LocationMetadata) -> Self {
        self.metadata.lock().insert(location_id.into(), meta);
        self
    }

    pub fn with_sale(self, id: &str, amount: &str, fees: &[&str]) -> Self {
        self.transactions.lock().push(Transaction {
            id: id.into(),
            kind: "SALE".into(),
            status: "SUCCESS".into(),
            amount: amount.parse().unwrap(),
            fees: fees.iter().map(|f| f.parse().unwrap()).collect(),
        });
        self
    }

    pub fn with_transaction(self, tx: Transaction) -> Self {
        self.transactions.lock().push(tx);
        self
    }

    pub fn with_order(self, order: OrderEvent) -> Self {
        self.set_order(order);
        self
    }

    pub fn set_order(&self, order: OrderEvent) {
        self.orders
            .lock()
            .insert(order.order_id().to_string(), order);
    }

    pub fn failing_assignment(self) -> Self {
        *self.fail_assignment.lock() = true;
        self
    }

    pub fn failing_metadata(self) -> Self {
        *self.fail_metadata.lock() = true;
        self
    }

    pub fn failing_transactions(self) -> Self {
        *self.fail_transactions.lock() = true;
        self
    }
}

#[async_trait]
impl CommercePlatform for FakeCommerce {
    async fn fulfillment_assignment(
        &self,
        _order_id: &str,
    ) -> Result<Option<FulfillmentAssignment>, ClientError> {
        if *self.fail_assignment.lock() {
            return Err(unavailable("shopify"));
        }
        Ok(self.assignment.lock().clone())
    }

    async fn location_metadata(&self, location_id: &str) -> Result<LocationMetadata, ClientError> {
        if *self.fail_metadata.lock() {
            return Err(unavailable("shopify"));
        }
        Ok(self
            .metadata
            .lock()
            .get(location_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn order_transactions(&self, _order_id: &str) -> Result<Vec<Transaction>, ClientError> {
        if *self.fail_transactions.lock() {
            return Err(unavailable("shopify"));
        }
        Ok(self.transactions.lock().clone())
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderEvent, ClientError> {
        self.orders
            .lock()
            .get(order_id)
            .cloned()
            .ok_or_else(|| ClientError::Status {
                service: "shopify",
                status: 404,
                body: "Not Found".into(),
            })
    }
}

// ========== POS ==========

#[derive(Default)]
pub struct FakePos {
    seq: AtomicUsize,
    /// POS order id → current order
    orders: Mutex<HashMap<String, PosOrder>>,
    /// idempotency key → response
    create_responses: Mutex<HashMap<String, PosOrder>>,
    update_responses: Mutex<HashMap<String, PosOrder>>,
    payment_responses: Mutex<HashMap<String, PosPayment>>,
    pub create_calls: Mutex<Vec<CreateOrderRequest>>,
    pub update_calls: Mutex<Vec<UpdateOrderRequest>>,
    pub payment_calls: Mutex<Vec<CreatePaymentRequest>>,
    fail_create: Mutex<bool>,
    fail_payment: Mutex<bool>,
    blank_ids: Mutex<bool>,
}

impl FakePos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create(self) -> Self {
        *self.fail_create.lock() = true;
        self
    }

    /// Created orders come back without an id
    pub fn with_blank_order_ids(self) -> Self {
        *self.blank_ids.lock() = true;
        self
    }

    pub fn set_fail_payment(&self, fail: bool) {
        *self.fail_payment.lock() = fail;
    }

    /// Distinct POS orders actually created
    pub fn order_count(&self) -> usize {
        self.orders.lock().len()
    }

    /// Distinct payments actually created
    pub fn payment_count(&self) -> usize {
        self.payment_responses.lock().len()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.seq.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Square's total: Σ (base + modifiers) × quantity
fn order_total(req: &CreateOrderRequest) -> Money {
    let amount = req
        .order
        .line_items
        .iter()
        .map(|li| {
            let qty: i64 = li
                .quantity
                .parse::<Decimal>()
                .ok()
                .and_then(|d| rust_decimal::prelude::ToPrimitive::to_i64(&d))
                .unwrap_or(1);
            let unit = li.base_price_money.amount
                + li
                    .modifiers
                    .iter()
                    .map(|m| m.base_price_money.amount)
                    .sum::<i64>();
            unit * qty
        })
        .sum();
    let currency = req
        .order
        .line_items
        .first()
        .map(|li| li.base_price_money.currency.clone())
        .unwrap_or_else(|| "USD".into());
    Money { amount, currency }
}

#[async_trait]
impl PosSystem for FakePos {
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<PosOrder, ClientError> {
        self.create_calls.lock().push(req.clone());
        if *self.fail_create.lock() {
            return Err(unavailable("square"));
        }
        if let Some(existing) = self.create_responses.lock().get(&req.idempotency_key) {
            return Ok(existing.clone());
        }
        let order = PosOrder {
            id: if *self.blank_ids.lock() {
                String::new()
            } else {
                self.next_id("sq-order")
            },
            version: 1,
            total_money: order_total(req),
            fulfillments: req
                .order
                .fulfillments
                .iter()
                .map(|f| FulfillmentRef {
                    uid: Some(f.uid.clone()),
                    state: Some(f.state),
                })
                .collect(),
        };
        self.orders.lock().insert(order.id.clone(), order.clone());
        self.create_responses
            .lock()
            .insert(req.idempotency_key.clone(), order.clone());
        Ok(order)
    }

    async fn update_order(
        &self,
        order_id: &str,
        req: &UpdateOrderRequest,
    ) -> Result<PosOrder, ClientError> {
        self.update_calls.lock().push(req.clone());
        if let Some(existing) = self.update_responses.lock().get(&req.idempotency_key) {
            return Ok(existing.clone());
        }
        let mut orders = self.orders.lock();
        let order = orders.get_mut(order_id).ok_or_else(|| ClientError::Status {
            service: "square",
            status: 404,
            body: "order not found".into(),
        })?;
        if order.version != req.order.version {
            return Err(ClientError::Status {
                service: "square",
                status: 409,
                body: "version mismatch".into(),
            });
        }
        order.version += 1;
        for update in &req.order.fulfillments {
            if let Some(f) = order
                .fulfillments
                .iter_mut()
                .find(|f| f.uid.as_deref() == Some(update.uid.as_str()))
            {
                f.state = Some(update.state);
            }
        }
        let updated = order.clone();
        self.update_responses
            .lock()
            .insert(req.idempotency_key.clone(), updated.clone());
        Ok(updated)
    }

    async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<PosPayment, ClientError> {
        self.payment_calls.lock().push(req.clone());
        if *self.fail_payment.lock() {
            return Err(unavailable("square"));
        }
        if let Some(existing) = self.payment_responses.lock().get(&req.idempotency_key) {
            return Ok(existing.clone());
        }
        let payment = PosPayment {
            id: self.next_id("sq-pay"),
            status: Some("COMPLETED".into()),
        };
        self.payment_responses
            .lock()
            .insert(req.idempotency_key.clone(), payment.clone());
        Ok(payment)
    }
}

// ========== Delivery ==========

#[derive(Default)]
pub struct FakeDelivery {
    seq: AtomicUsize,
    fail: Mutex<bool>,
    /// (api key, job) per accepted call
    pub jobs: Mutex<Vec<(String, DeliveryJob)>>,
}

impl FakeDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }
}

#[async_trait]
impl DeliveryService for FakeDelivery {
    async fn create_job(
        &self,
        api_key: &str,
        job: &DeliveryJob,
    ) -> Result<DeliveryReceipt, ClientError> {
        if *self.fail.lock() {
            return Err(unavailable("delivery"));
        }
        self.jobs.lock().push((api_key.to_string(), job.clone()));
        Ok(DeliveryReceipt {
            id: format!("dlv-{}", self.seq.fetch_add(1, Ordering::SeqCst) + 1),
            status: Some("queued".into()),
        })
    }
}
