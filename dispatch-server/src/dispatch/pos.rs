//! POS order mirroring
//!
//! # Idempotency keys
//!
//! | Call | Key |
//! |------|-----|
//! | create order | `order-<order id>` |
//! | advance fulfillment | `update-<order id>` |
//! | external payment | `payment-<order id>-<time bucket>` |
//!
//! The POS system deduplicates on these keys, so a redelivered event maps
//! onto the same POS order. The payment bucket changes every
//! `payment_window_secs`: retries inside the window are deduplicated, a
//! deliberate re-submission after it is not.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::money::{non_negative, sum_money, to_minor_units};
use shared::order::LineItem;
use shared::util::now_millis;
use shared::{FeeBreakdown, LocationConfig, OrderEvent};

use crate::clients::PosSystem;
use crate::clients::pos::{
    CreateOrderRequest, CreatePaymentRequest, ExternalDetails, FulfillmentState,
    FulfillmentStateUpdate, Money, OrderDraft, OrderSource, OrderUpdate, PickupDetails,
    PickupRecipient, PosFulfillment, PosLineItem, PosModifier, PosOrder, PosPayment,
    UpdateOrderRequest,
};
use super::{Stage, transition};
use crate::error::{DispatchError, UpstreamStep};

/// Name the POS shows as the order and payment source
pub const ORDER_SOURCE: &str = "Shopify";

/// Uid of the single pickup fulfillment on every POS order
pub const FULFILLMENT_UID: &str = "pickup";

/// Created POS order and its payment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosResult {
    pub pos_order_id: String,
    pub payment_id: String,
    /// Amount paid, in minor units (the POS order's own total)
    pub total_minor: i64,
}

pub fn create_order_key(order_id: &str) -> String {
    format!("order-{order_id}")
}

pub fn update_order_key(order_id: &str) -> String {
    format!("update-{order_id}")
}

pub fn payment_key(order_id: &str, now_millis: i64, window_secs: u64) -> String {
    let window_millis = i64::try_from(window_secs.max(1).saturating_mul(1000)).unwrap_or(i64::MAX);
    format!("payment-{order_id}-{}", now_millis.div_euclid(window_millis))
}

pub struct PosSubmitter {
    pos: Arc<dyn PosSystem>,
    payment_window_secs: u64,
}

impl PosSubmitter {
    pub fn new(pos: Arc<dyn PosSystem>, payment_window_secs: u64) -> Self {
        Self {
            pos,
            payment_window_secs,
        }
    }

    /// Create the POS order and pay it
    pub async fn submit(
        &self,
        event: &OrderEvent,
        location: &LocationConfig,
        fee: &FeeBreakdown,
    ) -> Result<PosResult, DispatchError> {
        let order = self.create_order(event, location).await?;
        let payment = self
            .record_payment(event, location, fee, &order, now_millis())
            .await?;
        Ok(PosResult {
            pos_order_id: order.id,
            payment_id: payment.id,
            total_minor: order.total_money.amount,
        })
    }

    /// Create the order (pickup fulfillment, `PROPOSED`) and advance it to
    /// `RESERVED` so it shows on the kitchen display
    pub async fn create_order(
        &self,
        event: &OrderEvent,
        location: &LocationConfig,
    ) -> Result<PosOrder, DispatchError> {
        let pos_location_id = require_pos_location(location)?;
        let order_id = event.order_id();

        let request = CreateOrderRequest {
            idempotency_key: create_order_key(order_id),
            order: build_draft(event, pos_location_id),
        };
        let order = self
            .pos
            .create_order(&request)
            .await
            .map_err(DispatchError::upstream(UpstreamStep::PosOrder))?;
        tracing::info!(order_id, pos_order_id = %order.id, version = order.version, "POS order created");
        transition(order_id, Stage::PosCreated);

        if !needs_reserve(&order) {
            tracing::debug!(order_id, pos_order_id = %order.id, "Fulfillment already advanced");
            return Ok(order);
        }

        let update = UpdateOrderRequest {
            idempotency_key: update_order_key(order_id),
            order: OrderUpdate {
                location_id: pos_location_id.to_string(),
                version: order.version,
                fulfillments: vec![FulfillmentStateUpdate {
                    uid: FULFILLMENT_UID.to_string(),
                    state: FulfillmentState::Reserved,
                }],
            },
        };
        let order = self
            .pos
            .update_order(&order.id, &update)
            .await
            .map_err(DispatchError::upstream(UpstreamStep::PosFulfillment))?;
        tracing::debug!(order_id, pos_order_id = %order.id, "Fulfillment reserved");
        Ok(order)
    }

    /// External payment for the POS order's own total
    ///
    /// The POS total is authoritative so both systems agree to the cent.
    pub async fn record_payment(
        &self,
        event: &OrderEvent,
        location: &LocationConfig,
        fee: &FeeBreakdown,
        order: &PosOrder,
        now_millis: i64,
    ) -> Result<PosPayment, DispatchError> {
        let pos_location_id = require_pos_location(location)?;
        let order_id = event.order_id();

        let request = CreatePaymentRequest {
            idempotency_key: payment_key(order_id, now_millis, self.payment_window_secs),
            source_id: "EXTERNAL",
            amount_money: order.total_money.clone(),
            order_id: order.id.clone(),
            location_id: pos_location_id.to_string(),
            reference_id: reference_id(event),
            external_details: ExternalDetails {
                kind: "EXTERNAL",
                source: ORDER_SOURCE.to_string(),
                source_id: fee.transaction_id().map(String::from),
            },
        };
        let payment = self
            .pos
            .create_payment(&request)
            .await
            .map_err(DispatchError::upstream(UpstreamStep::PosPayment))?;
        tracing::info!(
            order_id,
            pos_order_id = %order.id,
            payment_id = %payment.id,
            amount = order.total_money.amount,
            "POS payment recorded"
        );
        Ok(payment)
    }
}

fn require_pos_location(location: &LocationConfig) -> Result<&str, DispatchError> {
    let id = location.pos_location_id.trim();
    if id.is_empty() {
        return Err(DispatchError::Configuration(format!(
            "no POS location configured for {}",
            location.name
        )));
    }
    Ok(id)
}

fn needs_reserve(order: &PosOrder) -> bool {
    order
        .fulfillments
        .iter()
        .find(|f| f.uid.as_deref() == Some(FULFILLMENT_UID))
        .is_none_or(|f| matches!(f.state, None | Some(FulfillmentState::Proposed)))
}

fn reference_id(event: &OrderEvent) -> String {
    let number = event.display_number();
    if number.is_empty() {
        event.order_id().to_string()
    } else {
        number
    }
}

fn build_draft(event: &OrderEvent, pos_location_id: &str) -> OrderDraft {
    let currency = &event.currency;
    let mut line_items: Vec<PosLineItem> = event
        .line_items
        .iter()
        .map(|li| line_item(li, currency))
        .collect();

    if let Some(shipping) = event.shipping_line() {
        line_items.push(PosLineItem {
            name: format!("Delivery: {}", shipping.title),
            quantity: "1".into(),
            base_price_money: money(shipping.price, currency),
            note: None,
            modifiers: vec![],
        });
    }

    let display_name = match event.customer_name() {
        name if !name.is_empty() => name,
        _ => format!("Order #{}", reference_id(event)),
    };

    OrderDraft {
        location_id: pos_location_id.to_string(),
        reference_id: reference_id(event),
        source: OrderSource {
            name: ORDER_SOURCE.to_string(),
        },
        line_items,
        fulfillments: vec![PosFulfillment {
            uid: FULFILLMENT_UID.to_string(),
            kind: "PICKUP",
            state: FulfillmentState::Proposed,
            pickup_details: PickupDetails {
                recipient: PickupRecipient {
                    display_name,
                    phone_number: event.customer_phone(),
                    email_address: event.customer_email(),
                },
                schedule_type: "ASAP",
                note: event.note.clone().filter(|n| !n.trim().is_empty()),
            },
        }],
    }
}

/// The commerce line price already includes modifier prices, so the POS
/// base price is what remains after them.
fn line_item(li: &LineItem, currency: &str) -> PosLineItem {
    let modifiers = li.modifiers();
    let modifier_total = sum_money(modifiers.iter().map(|m| m.price));

    let note = li
        .visible_properties()
        .map(|p| format!("{}: {}", p.name, p.value))
        .collect::<Vec<_>>()
        .join(", ");

    PosLineItem {
        name: li.display_name(),
        quantity: li.quantity.to_string(),
        base_price_money: money(non_negative(li.price.saturating_sub(modifier_total)), currency),
        note: (!note.is_empty()).then_some(note),
        modifiers: modifiers
            .into_iter()
            .map(|m| PosModifier {
                name: m.name,
                base_price_money: money(m.price, currency),
            })
            .collect(),
    }
}

fn money(amount: Decimal, currency: &str) -> Money {
    Money {
        amount: to_minor_units(non_negative(amount)),
        currency: currency.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fakes::FakePos;
    use serde_json::json;

    const WINDOW: u64 = 600;
    const T0: i64 = 1_736_983_800_000;

    fn location(pos: &str) -> LocationConfig {
        LocationConfig {
            location_id: Some("gid-1".into()),
            pos_location_id: pos.into(),
            delivery_api_key: Some("key".into()),
            name: "Downtown".into(),
            time_zone: chrono_tz::America::New_York,
        }
    }

    fn event() -> OrderEvent {
        serde_json::from_value(json!({
            "id": 42,
            "order_number": 1042,
            "currency": "USD",
            "total_price": "24.50",
            "line_items": [
                {
                    "title": "Latte",
                    "variant_title": "Large",
                    "quantity": 1,
                    "price": "11.50",
                    "properties": [
                        {"name": "Milk", "value": "Oat"},
                        {"name": "_internal", "value": "x"},
                        {"name": "modifiers", "value": "[{\"name\":\"Extra shot\",\"price\":\"1.50\"}]"}
                    ]
                },
                {"title": "Cookie", "quantity": 2, "price": "4.50"}
            ],
            "shipping_lines": [{"title": "Local Delivery", "price": "4.00"}],
            "shipping_address": {"first_name": "Ada", "last_name": "Lovelace", "phone": "555-0100"}
        }))
        .unwrap()
    }

    fn fee() -> FeeBreakdown {
        FeeBreakdown::new("24.50".parse().unwrap(), "1.00".parse().unwrap(), Some("tx-9".into()))
    }

    #[test]
    fn test_draft_line_items() {
        let draft = build_draft(&event(), "POS-1");
        assert_eq!(draft.reference_id, "1042");
        assert_eq!(draft.line_items.len(), 3);

        let latte = &draft.line_items[0];
        assert_eq!(latte.name, "Latte - Large");
        assert_eq!(latte.base_price_money.amount, 1000);
        assert_eq!(latte.modifiers[0].base_price_money.amount, 150);
        assert_eq!(latte.note.as_deref(), Some("Milk: Oat"));

        let cookie = &draft.line_items[1];
        assert_eq!(cookie.quantity, "2");
        assert_eq!(cookie.base_price_money.amount, 450);
        assert!(cookie.note.is_none());

        let delivery = &draft.line_items[2];
        assert_eq!(delivery.name, "Delivery: Local Delivery");
        assert_eq!(delivery.base_price_money.amount, 400);

        let pickup = &draft.fulfillments[0];
        assert_eq!(pickup.state, FulfillmentState::Proposed);
        assert_eq!(pickup.pickup_details.recipient.display_name, "Ada Lovelace");
    }

    #[test]
    fn test_payment_key_buckets() {
        let a = payment_key("42", T0, WINDOW);
        assert_eq!(a, payment_key("42", T0 + 1_000, WINDOW));
        assert_ne!(a, payment_key("42", T0 + 600_000, WINDOW));
        assert!(a.starts_with("payment-42-"));
    }

    #[test]
    fn test_payment_key_window_saturates() {
        assert_eq!(payment_key("42", T0, u64::MAX), "payment-42-0");
        assert_eq!(payment_key("42", T0, 0), payment_key("42", T0, 1));
    }

    #[tokio::test]
    async fn test_creates_reserves_and_pays_pos_total() {
        let pos = Arc::new(FakePos::new());
        let submitter = PosSubmitter::new(pos.clone(), WINDOW);
        let loc = location("POS-1");
        let ev = event();

        let order = submitter.create_order(&ev, &loc).await.unwrap();
        assert_eq!(order.fulfillments[0].state, Some(FulfillmentState::Reserved));
        assert_eq!(order.version, 2);
        // 11.50 + 2 × 4.50 + 4.00
        assert_eq!(order.total_money.amount, 2450);

        submitter
            .record_payment(&ev, &loc, &fee(), &order, T0)
            .await
            .unwrap();
        let calls = pos.payment_calls.lock();
        assert_eq!(calls[0].amount_money.amount, 2450);
        assert_eq!(calls[0].source_id, "EXTERNAL");
        assert_eq!(calls[0].external_details.source_id.as_deref(), Some("tx-9"));
        assert_eq!(pos.create_calls.lock()[0].idempotency_key, "order-42");
        assert_eq!(pos.update_calls.lock()[0].idempotency_key, "update-42");
    }

    #[tokio::test]
    async fn test_replay_creates_no_duplicates() {
        let pos = Arc::new(FakePos::new());
        let submitter = PosSubmitter::new(pos.clone(), WINDOW);
        let loc = location("POS-1");
        let ev = event();

        let first = submitter.create_order(&ev, &loc).await.unwrap();
        let p1 = submitter
            .record_payment(&ev, &loc, &fee(), &first, T0)
            .await
            .unwrap();
        let second = submitter.create_order(&ev, &loc).await.unwrap();
        let p2 = submitter
            .record_payment(&ev, &loc, &fee(), &second, T0 + 30_000)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(p1.id, p2.id);
        assert_eq!(pos.order_count(), 1);
        assert_eq!(pos.payment_count(), 1);
    }

    #[tokio::test]
    async fn test_payment_after_window_is_new() {
        let pos = Arc::new(FakePos::new());
        let submitter = PosSubmitter::new(pos.clone(), WINDOW);
        let loc = location("POS-1");
        let ev = event();

        let order = submitter.create_order(&ev, &loc).await.unwrap();
        submitter
            .record_payment(&ev, &loc, &fee(), &order, T0)
            .await
            .unwrap();
        submitter
            .record_payment(&ev, &loc, &fee(), &order, T0 + 3_600_000)
            .await
            .unwrap();
        assert_eq!(pos.order_count(), 1);
        assert_eq!(pos.payment_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_pos_location_is_configuration_error() {
        let pos = Arc::new(FakePos::new());
        let submitter = PosSubmitter::new(pos.clone(), WINDOW);
        let err = submitter
            .submit(&event(), &location("  "), &fee())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Configuration(_)));
        assert!(pos.create_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_submit_returns_ids() {
        let pos = Arc::new(FakePos::new());
        let submitter = PosSubmitter::new(pos, WINDOW);
        let result = submitter
            .submit(&event(), &location("POS-1"), &fee())
            .await
            .unwrap();
        assert!(result.pos_order_id.starts_with("sq-order-"));
        assert!(result.payment_id.starts_with("sq-pay-"));
        assert_eq!(result.total_minor, 2450);
    }
}
