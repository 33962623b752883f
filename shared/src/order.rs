//! Inbound commerce order schema
//!
//! The commerce platform sends loosely shaped JSON: ids may be numbers or
//! strings, money is a decimal string, most fields are optional. These types
//! pin the shape down at the boundary and default missing values explicitly.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Line-item property carrying structured POS modifiers as a JSON array
pub const MODIFIERS_PROPERTY: &str = "modifiers";

/// Properties whose name starts with this prefix are internal (never shown)
pub const INTERNAL_PROPERTY_PREFIX: char = '_';

/// A commerce order as received from the order-created event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderEvent {
    #[serde(default, deserialize_with = "de_opt_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string")]
    pub order_number: Option<String>,
    /// Display name (`#1001`)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default, deserialize_with = "de_money")]
    pub total_price: Decimal,
    #[serde(default, deserialize_with = "de_money")]
    pub subtotal_price: Decimal,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "de_vec")]
    pub line_items: Vec<LineItem>,
    #[serde(default, deserialize_with = "de_vec")]
    pub shipping_lines: Vec<ShippingLine>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, deserialize_with = "de_money")]
    pub price: Decimal,
    #[serde(default, deserialize_with = "de_vec")]
    pub properties: Vec<Property>,
}

/// A selected option (`{"name": "Size", "value": "Large"}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_display_string")]
    pub value: String,
}

/// Structured modifier parsed from the `modifiers` property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    #[serde(default, deserialize_with = "de_money")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingLine {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "de_money")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub province_code: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl OrderEvent {
    /// Order identity, empty when absent (validated at the boundary)
    pub fn order_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Human order number, falling back to the display name without `#`
    pub fn display_number(&self) -> String {
        self.order_number
            .clone()
            .or_else(|| self.name.as_ref().map(|n| n.trim_start_matches('#').to_string()))
            .unwrap_or_default()
    }

    /// First shipping line, if any
    pub fn shipping_line(&self) -> Option<&ShippingLine> {
        self.shipping_lines.first()
    }

    pub fn customer_name(&self) -> String {
        if let Some(addr) = &self.shipping_address {
            let name = addr.full_name();
            if !name.is_empty() {
                return name;
            }
        }
        self.customer
            .as_ref()
            .map(|c| join_name(c.first_name.as_deref(), c.last_name.as_deref()))
            .unwrap_or_default()
    }

    pub fn customer_email(&self) -> Option<String> {
        non_empty(self.email.as_deref())
            .or_else(|| non_empty(self.customer.as_ref().and_then(|c| c.email.as_deref())))
    }

    pub fn customer_phone(&self) -> Option<String> {
        non_empty(self.shipping_address.as_ref().and_then(|a| a.phone.as_deref()))
            .or_else(|| non_empty(self.phone.as_deref()))
            .or_else(|| non_empty(self.customer.as_ref().and_then(|c| c.phone.as_deref())))
    }
}

impl LineItem {
    /// Title plus variant (`Latte - Large`)
    pub fn display_name(&self) -> String {
        match self.variant_title.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() && v != "Default Title" => format!("{} - {}", self.title, v),
            _ => self.title.clone(),
        }
    }

    /// Properties a customer can see: not internal, not the structured modifier payload
    pub fn visible_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(|p| !p.is_internal() && p.name != MODIFIERS_PROPERTY && !p.value.is_empty())
    }

    /// Structured modifiers, empty when absent or unparsable
    pub fn modifiers(&self) -> Vec<Modifier> {
        self.properties
            .iter()
            .find(|p| p.name == MODIFIERS_PROPERTY)
            .and_then(|p| match serde_json::from_str::<Vec<Modifier>>(&p.value) {
                Ok(m) => Some(m),
                Err(e) => {
                    tracing::warn!(error = %e, item = %self.title, "Ignoring malformed modifiers property");
                    None
                }
            })
            .unwrap_or_default()
    }
}

impl Property {
    pub fn is_internal(&self) -> bool {
        self.name.starts_with(INTERNAL_PROPERTY_PREFIX)
    }
}

impl Address {
    pub fn full_name(&self) -> String {
        match non_empty(self.name.as_deref()) {
            Some(name) => name,
            None => join_name(self.first_name.as_deref(), self.last_name.as_deref()),
        }
    }

    /// Single-line street address (`1 Main St, Apt 2, Springfield, IL 62701`)
    pub fn one_line(&self) -> String {
        let region = [self.province_code.as_deref(), self.zip.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        [
            self.address1.as_deref(),
            self.address2.as_deref(),
            self.city.as_deref(),
            Some(region.as_str()),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

fn join_name(first: Option<&str>, last: Option<&str>) -> String {
    [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_quantity() -> u32 {
    1
}

// ========== Boundary deserializers ==========

/// Number or string → string; null/other → None
fn de_opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Any scalar → display string; null → empty
fn de_display_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

/// Decimal string or number → Decimal; null → zero
fn de_money<'de, D: Deserializer<'de>>(d: D) -> Result<Decimal, D::Error> {
    use serde::de::Error;
    match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Decimal::ZERO),
        Some(Value::String(s)) => s.trim().parse().map_err(D::Error::custom),
        Some(Value::Number(n)) => n.to_string().parse().map_err(D::Error::custom),
        Some(Value::Null) | None => Ok(Decimal::ZERO),
        Some(other) => Err(D::Error::custom(format!("invalid money value: {other}"))),
    }
}

/// Array → Vec; null → empty
fn de_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(d)?.unwrap_or_default())
}
