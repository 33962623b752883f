//! Dispatch audit record
//!
//! # Key layout
//!
//! | Partition | Sort | Meaning |
//! |-----------|------|---------|
//! | `ORDER#<order id>` | `SHOPIFY#<order id>` | successful dispatch (at most one) |
//! | `ORDER#<order id>` | `ERROR#<epoch millis>` | failed attempt (any number) |
//! | `ORDER#<order id>` | `METADATA#…` | reserved |

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::order::Address;

pub const PARTITION_PREFIX: &str = "ORDER#";
pub const SUCCESS_PREFIX: &str = "SHOPIFY#";
pub const ERROR_PREFIX: &str = "ERROR#";
pub const METADATA_PREFIX: &str = "METADATA#";

pub fn partition_key(order_id: &str) -> String {
    format!("{PARTITION_PREFIX}{order_id}")
}

pub fn success_sort_key(order_id: &str) -> String {
    format!("{SUCCESS_PREFIX}{order_id}")
}

pub fn error_sort_key(millis: i64) -> String {
    format!("{ERROR_PREFIX}{millis}")
}

/// `<POS location id>#<date>`
pub fn location_date_key(pos_location_id: &str, date: &str) -> String {
    format!("{pos_location_id}#{date}")
}

/// Kind of record, derived from the sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Success,
    Error,
    Metadata,
}

impl RecordKind {
    /// Unknown prefixes are treated as metadata
    pub fn from_sort_key(sk: &str) -> Self {
        if sk.starts_with(SUCCESS_PREFIX) {
            Self::Success
        } else if sk.starts_with(ERROR_PREFIX) {
            Self::Error
        } else {
            Self::Metadata
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Metadata => "metadata",
        }
    }
}

/// Outcome tag of one dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchStatus {
    /// POS order, payment and delivery job all created
    Dispatched,
    /// POS order paid, delivery job failed or skipped
    PosOnly,
    /// Aborted before the POS payment completed
    Failed,
}

/// `local` when the shipping line indicates a delivery, else `shipping`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Local,
    Shipping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditProperty {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLineItem {
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    /// Non-internal option properties only
    #[serde(default)]
    pub properties: Vec<AuditProperty>,
    #[serde(default)]
    pub modifiers: Vec<String>,
}

/// The persisted unit of truth for one dispatch attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchAuditRecord {
    pub pk: String,
    pub sk: String,
    pub order_id: String,
    pub order_number: String,
    pub status: DispatchStatus,

    #[serde(default)]
    pub pos_order_id: Option<String>,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub delivery_order_id: Option<String>,

    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub pos_location_id: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<Address>,

    #[serde(default)]
    pub delivery_type: Option<DeliveryType>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub gross: Option<Decimal>,
    #[serde(default)]
    pub fee: Option<Decimal>,
    #[serde(default)]
    pub net: Option<Decimal>,
    #[serde(default)]
    pub fee_transaction_id: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub line_items: Vec<AuditLineItem>,

    /// Location-local business day `YYYY-MM-DD`
    #[serde(default)]
    pub date: Option<String>,
    /// `<POS location id>#<date>`
    #[serde(default)]
    pub location_date: Option<String>,

    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub healed_at: Option<i64>,

    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_stack: Option<String>,
}

impl DispatchAuditRecord {
    pub fn kind(&self) -> RecordKind {
        RecordKind::from_sort_key(&self.sk)
    }
}

/// Record as returned by the read path, annotated with its kind
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotatedRecord {
    pub record_type: RecordKind,
    #[serde(flatten)]
    pub record: DispatchAuditRecord,
}

impl From<DispatchAuditRecord> for AnnotatedRecord {
    fn from(record: DispatchAuditRecord) -> Self {
        Self {
            record_type: record.kind(),
            record,
        }
    }
}
