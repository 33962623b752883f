//! Dispatch pipeline
//!
//! Any error before `PosPaid` aborts the dispatch and leaves a failure
//! record. After `PosPaid` the customer has paid and the kitchen has the
//! order, so a delivery problem only degrades the outcome. The response is
//! only a success once the success record is stored: a dispatch that cannot
//! be audited is reported as an error so the event source redelivers it.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::location::LocationSummary;
use shared::money::from_minor_units;
use shared::util::now_millis;
use shared::{DeliveryType, DispatchStatus, FeeBreakdown, LocationConfig, OrderEvent};

use super::delivery::DeliverySubmitter;
use super::fees::FeeReconciler;
use super::ledger::{self, FailureEntry, LedgerWriter, SuccessEntry};
use super::location::LocationResolver;
use super::pos::PosSubmitter;
use super::validator::parse_event;
use super::{Stage, transition};
use crate::clients::{ClientError, CommercePlatform, DeliveryService, PosSystem};
use crate::error::{DispatchError, UpstreamStep, error_chain};
use crate::ledger::AuditStore;

/// Everything needed to reconcile one dispatch by hand
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchOutcome {
    pub order_id: String,
    pub order_number: String,
    pub status: DispatchStatus,
    pub pos_order_id: String,
    pub payment_id: String,
    pub delivery_order_id: Option<String>,
    /// Why the delivery job failed on this attempt
    pub delivery_error: Option<String>,
    pub delivery_type: DeliveryType,
    pub location: LocationSummary,
    pub fee: FeeBreakdown,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
    /// Amount the POS order was paid for
    pub pos_total: Decimal,
}

pub struct Dispatcher {
    locations: LocationResolver,
    fees: FeeReconciler,
    pos: PosSubmitter,
    delivery: DeliverySubmitter,
    ledger: LedgerWriter,
}

impl Dispatcher {
    pub fn new(
        commerce: Arc<dyn CommercePlatform>,
        pos: Arc<dyn PosSystem>,
        delivery: Arc<dyn DeliveryService>,
        store: AuditStore,
        default_location: LocationConfig,
        payment_window_secs: u64,
    ) -> Self {
        Self {
            locations: LocationResolver::new(commerce.clone(), default_location),
            fees: FeeReconciler::new(commerce),
            pos: PosSubmitter::new(pos, payment_window_secs),
            delivery: DeliverySubmitter::new(delivery),
            ledger: LedgerWriter::new(store),
        }
    }

    /// Validate a raw event body and dispatch it
    pub async fn dispatch_body(&self, body: &[u8]) -> Result<DispatchOutcome, DispatchError> {
        let event = parse_event(body).inspect_err(|e| {
            tracing::warn!(error = %e, "Rejected order event");
        })?;
        self.dispatch(&event).await
    }

    pub async fn dispatch(&self, event: &OrderEvent) -> Result<DispatchOutcome, DispatchError> {
        let order_id = event.order_id();
        transition(order_id, Stage::Received);

        let location = self.locations.resolve(event).await;
        transition(order_id, Stage::LocationResolved);

        let fee = self.fees.reconcile_or_fallback(event).await;
        transition(order_id, Stage::FeeResolved);

        let pos = match self.pos.submit(event, &location, &fee).await {
            Ok(pos) => pos,
            Err(err) => {
                self.record_failure(event, &location, &err).await;
                return Err(err);
            }
        };
        transition(order_id, Stage::PosPaid);

        let (delivery, delivery_error) = match self
            .delivery
            .submit(event, &location, &pos.pos_order_id)
            .await
        {
            Ok(Some(d)) => {
                transition(order_id, Stage::DeliveryCreated);
                (Some(d), None)
            }
            Ok(None) => {
                transition(order_id, Stage::DeliverySkipped);
                (None, None)
            }
            Err(e) => {
                let chain = error_chain(&e);
                tracing::warn!(
                    order_id,
                    pos_order_id = %pos.pos_order_id,
                    error = %chain,
                    "Delivery job failed, order is in the POS only"
                );
                transition(order_id, Stage::DeliverySkipped);
                (None, Some(chain))
            }
        };

        let entry = SuccessEntry {
            event,
            location: &location,
            fee: &fee,
            pos: &pos,
            delivery: delivery.as_ref(),
            now_millis: now_millis(),
        };
        let Some(record) = ledger::success_record(&entry) else {
            let err = DispatchError::upstream(UpstreamStep::PosOrder)(ClientError::malformed(
                "pos",
                "created order has no id",
            ));
            self.record_failure(event, &location, &err).await;
            return Err(err);
        };
        let record = self.ledger.record_success(record).await.map_err(|e| {
            tracing::error!(
                order_id,
                pos_order_id = %pos.pos_order_id,
                payment_id = %pos.payment_id,
                error = %e,
                "Failed to write success record"
            );
            DispatchError::from(e)
        })?;
        transition(order_id, Stage::Audited);
        tracing::info!(order_id, status = ?record.status, "Dispatch complete");

        let subtotal = ledger::compute_subtotal(event);
        let shipping = ledger::compute_shipping(event);
        Ok(DispatchOutcome {
            order_id: order_id.to_string(),
            order_number: event.display_number(),
            status: record.status,
            pos_order_id: pos.pos_order_id,
            payment_id: pos.payment_id,
            delivery_order_id: record.delivery_order_id,
            delivery_error,
            delivery_type: ledger::classify_delivery(&event.shipping_lines),
            location: location.summary(),
            fee,
            subtotal,
            shipping,
            total: event.total_price,
            pos_total: from_minor_units(pos.total_minor),
        })
    }

    async fn record_failure(&self, event: &OrderEvent, location: &LocationConfig, err: &DispatchError) {
        let order_id = event.order_id();
        let stack = error_chain(err);
        tracing::error!(order_id, error = %stack, "Dispatch failed");

        let record = ledger::failure_record(&FailureEntry {
            event,
            location,
            message: &err.to_string(),
            stack: &stack,
            now_millis: now_millis(),
        });
        if let Err(e) = self.ledger.record_failure(record).await {
            tracing::error!(order_id, error = %e, "Failed to write failure record");
        }
    }
}
