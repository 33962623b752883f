//! Commerce platform (Shopify Admin API) via REST + GraphQL (no SDK dependency)

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use shared::OrderEvent;

use super::{ClientError, http_error, read_json};

const SERVICE: &str = "shopify";

/// Location the platform assigned an order to
#[derive(Debug, Clone, PartialEq)]
pub struct FulfillmentAssignment {
    pub location_id: String,
    pub name: Option<String>,
}

/// Extended per-location configuration kept as location metafields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationMetadata {
    pub pos_location_id: Option<String>,
    pub delivery_api_key: Option<String>,
    pub time_zone: Option<String>,
}

/// One payment transaction on an order
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    /// `SALE`, `AUTHORIZATION`, `CAPTURE`, `REFUND`, ...
    pub kind: String,
    /// `SUCCESS`, `FAILURE`, `PENDING`, ...
    pub status: String,
    pub amount: Decimal,
    /// Processor fee entries attached to the transaction
    pub fees: Vec<Decimal>,
}

impl Transaction {
    pub fn is_successful_sale(&self) -> bool {
        self.kind.eq_ignore_ascii_case("sale") && self.status.eq_ignore_ascii_case("success")
    }
}

#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Assigned fulfillment location, `None` when the order has none
    async fn fulfillment_assignment(
        &self,
        order_id: &str,
    ) -> Result<Option<FulfillmentAssignment>, ClientError>;

    async fn location_metadata(&self, location_id: &str) -> Result<LocationMetadata, ClientError>;

    async fn order_transactions(&self, order_id: &str) -> Result<Vec<Transaction>, ClientError>;

    /// Current state of an order (source of truth for healing)
    async fn fetch_order(&self, order_id: &str) -> Result<OrderEvent, ClientError>;
}

/// Shopify Admin API client
pub struct ShopifyClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl ShopifyClient {
    pub fn new(
        client: Client,
        shop_domain: &str,
        api_version: &str,
        access_token: impl Into<String>,
    ) -> Self {
        let host = shop_domain
            .trim_start_matches("https://")
            .trim_end_matches('/');
        Self {
            client,
            base_url: format!("https://{host}/admin/api/{api_version}"),
            access_token: access_token.into(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header("X-Shopify-Access-Token", &self.access_token)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        read_json(SERVICE, resp).await
    }
}

// ── REST / GraphQL wire shapes ──

#[derive(Deserialize)]
struct FulfillmentOrdersResponse {
    #[serde(default)]
    fulfillment_orders: Vec<FulfillmentOrderWire>,
}

#[derive(Deserialize)]
struct FulfillmentOrderWire {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assigned_location_id: Option<Value>,
    #[serde(default)]
    assigned_location: Option<AssignedLocationWire>,
}

#[derive(Deserialize)]
struct AssignedLocationWire {
    #[serde(default)]
    location_id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct MetafieldsResponse {
    #[serde(default)]
    metafields: Vec<MetafieldWire>,
}

#[derive(Deserialize)]
struct MetafieldWire {
    key: String,
    #[serde(default)]
    value: Option<Value>,
}

#[derive(Deserialize)]
struct OrderResponse {
    order: OrderEvent,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

const TRANSACTIONS_QUERY: &str = r#"
query OrderTransactions($id: ID!) {
  order(id: $id) {
    transactions(first: 20) {
      id
      kind
      status
      amountSet { shopMoney { amount } }
      fees { amount { amount } }
    }
  }
}"#;

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn decimal_at(v: &Value, pointer: &str) -> Decimal {
    match v.pointer(pointer) {
        Some(Value::String(s)) => s.parse().unwrap_or_default(),
        Some(Value::Number(n)) => n.to_string().parse().unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

/// `gid://shopify/OrderTransaction/123` → `123`
fn strip_gid(id: &str) -> String {
    id.rsplit('/').next().unwrap_or(id).to_string()
}

fn parse_transactions(data: &Value) -> Result<Vec<Transaction>, ClientError> {
    let Some(order) = data.get("order").filter(|o| !o.is_null()) else {
        return Err(ClientError::malformed(SERVICE, "order not found"));
    };
    let list = order
        .get("transactions")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(list
        .iter()
        .map(|tx| Transaction {
            id: tx
                .get("id")
                .and_then(Value::as_str)
                .map(strip_gid)
                .unwrap_or_default(),
            kind: tx
                .get("kind")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: tx
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            amount: decimal_at(tx, "/amountSet/shopMoney/amount"),
            fees: tx
                .get("fees")
                .and_then(Value::as_array)
                .map(|fees| fees.iter().map(|f| decimal_at(f, "/amount/amount")).collect())
                .unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl CommercePlatform for ShopifyClient {
    async fn fulfillment_assignment(
        &self,
        order_id: &str,
    ) -> Result<Option<FulfillmentAssignment>, ClientError> {
        let resp: FulfillmentOrdersResponse = self
            .get(&format!("/orders/{order_id}/fulfillment_orders.json"))
            .await?;

        // Prefer an open fulfillment order; cancelled ones keep stale assignments
        let mut orders = resp.fulfillment_orders;
        orders.sort_by_key(|fo| fo.status.as_deref() == Some("cancelled"));

        Ok(orders.into_iter().find_map(|fo| {
            let assigned = fo.assigned_location;
            let location_id = assigned
                .as_ref()
                .and_then(|a| a.location_id.as_ref())
                .or(fo.assigned_location_id.as_ref())
                .and_then(id_string)?;
            Some(FulfillmentAssignment {
                location_id,
                name: assigned.and_then(|a| a.name),
            })
        }))
    }

    async fn location_metadata(&self, location_id: &str) -> Result<LocationMetadata, ClientError> {
        let resp: MetafieldsResponse = self
            .get(&format!("/locations/{location_id}/metafields.json"))
            .await?;

        let mut meta = LocationMetadata::default();
        for field in resp.metafields {
            let value = field.value.as_ref().and_then(id_string);
            match field.key.as_str() {
                "pos_location_id" | "square_location_id" => meta.pos_location_id = value,
                "delivery_api_key" => meta.delivery_api_key = value,
                "time_zone" | "timezone" => meta.time_zone = value,
                _ => {}
            }
        }
        Ok(meta)
    }

    async fn order_transactions(&self, order_id: &str) -> Result<Vec<Transaction>, ClientError> {
        let body = json!({
            "query": TRANSACTIONS_QUERY,
            "variables": { "id": format!("gid://shopify/Order/{order_id}") },
        });
        let resp = self
            .client
            .post(format!("{}/graphql.json", self.base_url))
            .header("X-Shopify-Access-Token", &self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let resp: GraphqlResponse = read_json(SERVICE, resp).await?;

        if let Some(errors) = resp.errors.filter(|e| !e.is_null()) {
            return Err(ClientError::malformed(SERVICE, errors.to_string()));
        }
        let data = resp
            .data
            .ok_or_else(|| ClientError::malformed(SERVICE, "missing data"))?;
        parse_transactions(&data)
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderEvent, ClientError> {
        let resp: OrderResponse = self.get(&format!("/orders/{order_id}.json")).await?;
        Ok(resp.order)
    }
}
