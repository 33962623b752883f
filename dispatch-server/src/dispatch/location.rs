//! Fulfillment location resolution

use std::sync::Arc;

use shared::util::parse_time_zone;
use shared::{LocationConfig, OrderEvent};

use crate::clients::CommercePlatform;
use crate::clients::commerce::FulfillmentAssignment;

/// Resolves the [`LocationConfig`] owning an order
///
/// Never fails: any lookup problem degrades to the injected default, keeping
/// whatever location identity was already learned.
pub struct LocationResolver {
    commerce: Arc<dyn CommercePlatform>,
    default: LocationConfig,
}

impl LocationResolver {
    pub fn new(commerce: Arc<dyn CommercePlatform>, default: LocationConfig) -> Self {
        Self { commerce, default }
    }

    pub async fn resolve(&self, event: &OrderEvent) -> LocationConfig {
        let order_id = event.order_id();

        let assignment = match self.commerce.fulfillment_assignment(order_id).await {
            Ok(Some(a)) => a,
            Ok(None) => {
                tracing::warn!(order_id, "Order has no fulfillment assignment, using default location");
                return self.default.clone();
            }
            Err(e) => {
                tracing::warn!(order_id, error = %e, "Fulfillment lookup failed, using default location");
                return self.default.clone();
            }
        };

        let meta = match self.commerce.location_metadata(&assignment.location_id).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(
                    order_id,
                    location_id = %assignment.location_id,
                    error = %e,
                    "Location metadata lookup failed, using default location"
                );
                return self.with_identity(assignment, None);
            }
        };

        let time_zone = meta.time_zone.as_deref().and_then(|name| {
            let tz = parse_time_zone(name);
            if tz.is_none() {
                tracing::warn!(order_id, time_zone = name, "Ignoring unknown location time zone");
            }
            tz
        });

        let candidate = LocationConfig {
            location_id: Some(assignment.location_id.clone()),
            pos_location_id: meta.pos_location_id.unwrap_or_default(),
            delivery_api_key: meta.delivery_api_key,
            name: assignment
                .name
                .clone()
                .unwrap_or_else(|| self.default.name.clone()),
            time_zone: time_zone.unwrap_or(self.default.time_zone),
        };

        if candidate.is_complete() {
            tracing::debug!(
                order_id,
                location = %candidate.name,
                pos_location_id = %candidate.pos_location_id,
                "Location resolved"
            );
            candidate
        } else {
            tracing::warn!(
                order_id,
                location_id = %assignment.location_id,
                "Location metadata incomplete, using default POS location and credential"
            );
            self.with_identity(assignment, time_zone)
        }
    }

    /// Default settings carrying the assigned location's identity
    fn with_identity(
        &self,
        assignment: FulfillmentAssignment,
        time_zone: Option<chrono_tz::Tz>,
    ) -> LocationConfig {
        LocationConfig {
            location_id: Some(assignment.location_id),
            name: assignment.name.unwrap_or_else(|| self.default.name.clone()),
            time_zone: time_zone.unwrap_or(self.default.time_zone),
            ..self.default.clone()
        }
    }
}
