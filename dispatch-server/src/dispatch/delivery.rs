//! Delivery job submission

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::order::LineItem;
use shared::{LocationConfig, OrderEvent};

use crate::clients::DeliveryService;
use crate::clients::delivery::{DeliveryAddress, DeliveryCustomer, DeliveryItem, DeliveryJob};
use crate::error::{DispatchError, UpstreamStep};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryResult {
    pub delivery_order_id: String,
    pub status: Option<String>,
}

pub struct DeliverySubmitter {
    delivery: Arc<dyn DeliveryService>,
}

impl DeliverySubmitter {
    pub fn new(delivery: Arc<dyn DeliveryService>) -> Self {
        Self { delivery }
    }

    /// Create a delivery job cross-referenced to the POS order
    ///
    /// `Ok(None)` when the location has no delivery credential. The service
    /// takes no idempotency key: a retried dispatch may create a second job.
    pub async fn submit(
        &self,
        event: &OrderEvent,
        location: &LocationConfig,
        pos_order_id: &str,
    ) -> Result<Option<DeliveryResult>, DispatchError> {
        let order_id = event.order_id();
        let Some(api_key) = location.delivery_credential() else {
            tracing::info!(order_id, location = %location.name, "No delivery credential, skipping delivery");
            return Ok(None);
        };

        let job = build_job(event, location, pos_order_id);
        let receipt = self
            .delivery
            .create_job(api_key, &job)
            .await
            .map_err(DispatchError::upstream(UpstreamStep::Delivery))?;
        tracing::info!(order_id, delivery_order_id = %receipt.id, "Delivery job created");

        Ok(Some(DeliveryResult {
            delivery_order_id: receipt.id,
            status: receipt.status,
        }))
    }
}

fn build_job(event: &OrderEvent, location: &LocationConfig, pos_order_id: &str) -> DeliveryJob {
    let address = event
        .shipping_address
        .as_ref()
        .map(|a| DeliveryAddress {
            street: a.address1.clone().unwrap_or_default(),
            unit: a.address2.clone().filter(|s| !s.trim().is_empty()),
            city: a.city.clone().unwrap_or_default(),
            region: a
                .province_code
                .clone()
                .or_else(|| a.province.clone())
                .unwrap_or_default(),
            postal_code: a.zip.clone().unwrap_or_default(),
            country: a
                .country_code
                .clone()
                .or_else(|| a.country.clone())
                .unwrap_or_default(),
            formatted: a.one_line(),
        })
        .unwrap_or_default();

    DeliveryJob {
        external_reference: pos_order_id.to_string(),
        order_number: event.display_number(),
        pickup_location: location.name.clone(),
        customer: DeliveryCustomer {
            name: event.customer_name(),
            phone: event.customer_phone(),
            email: event.customer_email(),
            address,
        },
        items: event.line_items.iter().map(item).collect(),
        delivery_fee: event
            .shipping_line()
            .map(|s| s.price)
            .unwrap_or(Decimal::ZERO),
        currency: event.currency.clone(),
        notes: event.note.clone().filter(|n| !n.trim().is_empty()),
    }
}

fn item(li: &LineItem) -> DeliveryItem {
    let variant = li
        .variant_title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "Default Title")
        .map(String::from);
    let detail = variant
        .into_iter()
        .chain(li.visible_properties().map(|p| format!("{}: {}", p.name, p.value)))
        .collect::<Vec<_>>()
        .join("; ");

    DeliveryItem {
        name: li.title.clone(),
        quantity: li.quantity,
        unit_price: li.price,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::fakes::FakeDelivery;
    use serde_json::json;

    fn location(key: Option<&str>) -> LocationConfig {
        LocationConfig {
            location_id: Some("gid-1".into()),
            pos_location_id: "POS-1".into(),
            delivery_api_key: key.map(String::from),
            name: "Downtown".into(),
            time_zone: chrono_tz::America::New_York,
        }
    }

    fn event() -> OrderEvent {
        serde_json::from_value(json!({
            "id": 42,
            "name": "#1042",
            "email": "ada@example.com",
            "note": "Ring twice",
            "line_items": [{
                "title": "Latte",
                "variant_title": "Large",
                "quantity": 2,
                "price": "5.00",
                "properties": [
                    {"name": "Milk", "value": "Oat"},
                    {"name": "_sync", "value": "1"}
                ]
            }],
            "shipping_lines": [{"title": "Local Delivery", "price": "4.00"}],
            "shipping_address": {
                "first_name": "Ada", "last_name": "Lovelace",
                "address1": "1 Main St", "address2": "Apt 2",
                "city": "Springfield", "province_code": "IL", "zip": "62701",
                "country_code": "US", "phone": "555-0100"
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_job_shape() {
        let job = build_job(&event(), &location(Some("k")), "sq-order-1");
        assert_eq!(job.external_reference, "sq-order-1");
        assert_eq!(job.order_number, "1042");
        assert_eq!(job.pickup_location, "Downtown");
        assert_eq!(job.customer.name, "Ada Lovelace");
        assert_eq!(job.customer.phone.as_deref(), Some("555-0100"));
        assert_eq!(job.customer.address.unit.as_deref(), Some("Apt 2"));
        assert_eq!(
            job.customer.address.formatted,
            "1 Main St, Apt 2, Springfield, IL 62701"
        );
        assert_eq!(job.items[0].detail, "Large; Milk: Oat");
        assert_eq!(job.items[0].quantity, 2);
        assert_eq!(job.delivery_fee, "4.00".parse::<Decimal>().unwrap());
        assert_eq!(job.notes.as_deref(), Some("Ring twice"));
    }

    #[tokio::test]
    async fn test_submit_uses_location_credential() {
        let delivery = Arc::new(FakeDelivery::new());
        let submitter = DeliverySubmitter::new(delivery.clone());
        let result = submitter
            .submit(&event(), &location(Some("key-7")), "sq-order-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.delivery_order_id, "dlv-1");
        assert_eq!(delivery.jobs.lock()[0].0, "key-7");
    }

    #[tokio::test]
    async fn test_skipped_without_credential() {
        let delivery = Arc::new(FakeDelivery::new());
        let submitter = DeliverySubmitter::new(delivery.clone());
        let result = submitter
            .submit(&event(), &location(None), "sq-order-1")
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(delivery.jobs.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_upstream_error() {
        let submitter = DeliverySubmitter::new(Arc::new(FakeDelivery::new().failing()));
        let err = submitter
            .submit(&event(), &location(Some("k")), "sq-order-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Upstream {
                step: UpstreamStep::Delivery,
                ..
            }
        ));
    }
}
