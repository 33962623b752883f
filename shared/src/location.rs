//! Per-location dispatch configuration

use chrono_tz::Tz;
use serde::Serialize;

/// Settings resolved for the location fulfilling an order
///
/// Recomputed per dispatch, never persisted as a whole. The delivery
/// credential is deliberately not serializable.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationConfig {
    /// Fulfillment location id on the commerce platform
    pub location_id: Option<String>,
    /// POS location the order is created under
    pub pos_location_id: String,
    /// Delivery-service credential
    pub delivery_api_key: Option<String>,
    /// Display name
    pub name: String,
    /// Local business-day time zone
    pub time_zone: Tz,
}

/// Serializable view of a [`LocationConfig`] (no credential)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub location_id: Option<String>,
    pub pos_location_id: String,
    pub name: String,
    pub time_zone: String,
}

impl LocationConfig {
    /// Both the POS location and the delivery credential are present
    pub fn is_complete(&self) -> bool {
        !self.pos_location_id.trim().is_empty() && self.delivery_credential().is_some()
    }

    /// Non-empty delivery credential
    pub fn delivery_credential(&self) -> Option<&str> {
        self.delivery_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn summary(&self) -> LocationSummary {
        LocationSummary {
            location_id: self.location_id.clone(),
            pos_location_id: self.pos_location_id.clone(),
            name: self.name.clone(),
            time_zone: self.time_zone.name().to_string(),
        }
    }
}
