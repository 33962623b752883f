//! POS system (Square API v2) via REST (no SDK dependency)
//!
//! Every mutating call carries a caller-supplied idempotency key; Square
//! returns the original response when a key is replayed.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ClientError, http_error, read_json};

const SERVICE: &str = "square";
const SQUARE_VERSION: &str = "2024-10-17";

/// Integer minor units + ISO currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosModifier {
    pub name: String,
    pub base_price_money: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosLineItem {
    pub name: String,
    /// Square takes quantities as decimal strings
    pub quantity: String,
    pub base_price_money: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modifiers: Vec<PosModifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupRecipient {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickupDetails {
    pub recipient: PickupRecipient,
    pub schedule_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentState {
    Proposed,
    /// Shown on the kitchen display
    Reserved,
    Prepared,
    Completed,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PosFulfillment {
    pub uid: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub state: FulfillmentState,
    pub pickup_details: PickupDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSource {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDraft {
    pub location_id: String,
    pub reference_id: String,
    pub source: OrderSource,
    pub line_items: Vec<PosLineItem>,
    pub fulfillments: Vec<PosFulfillment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateOrderRequest {
    pub idempotency_key: String,
    pub order: OrderDraft,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FulfillmentStateUpdate {
    pub uid: String,
    pub state: FulfillmentState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderUpdate {
    pub location_id: String,
    pub version: i64,
    pub fulfillments: Vec<FulfillmentStateUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateOrderRequest {
    pub idempotency_key: String,
    pub order: OrderUpdate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExternalDetails {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePaymentRequest {
    pub idempotency_key: String,
    /// Always `EXTERNAL`: money was captured by the commerce platform
    pub source_id: &'static str,
    pub amount_money: Money,
    pub order_id: String,
    pub location_id: String,
    pub reference_id: String,
    pub external_details: ExternalDetails,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FulfillmentRef {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub state: Option<FulfillmentState>,
}

/// POS order as returned by create/update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PosOrder {
    pub id: String,
    #[serde(default)]
    pub version: i64,
    pub total_money: Money,
    #[serde(default)]
    pub fulfillments: Vec<FulfillmentRef>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PosPayment {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait PosSystem: Send + Sync {
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<PosOrder, ClientError>;

    async fn update_order(
        &self,
        order_id: &str,
        req: &UpdateOrderRequest,
    ) -> Result<PosOrder, ClientError>;

    async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<PosPayment, ClientError>;
}

/// Square API client
pub struct SquareClient {
    client: Client,
    base_url: String,
    access_token: String,
}

#[derive(Deserialize)]
struct OrderEnvelope {
    order: PosOrder,
}

#[derive(Deserialize)]
struct PaymentEnvelope {
    payment: PosPayment,
}

impl SquareClient {
    pub fn new(client: Client, base_url: &str, access_token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.access_token)
            .header("Square-Version", SQUARE_VERSION)
    }
}

#[async_trait]
impl PosSystem for SquareClient {
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<PosOrder, ClientError> {
        let resp = self
            .request(reqwest::Method::POST, "/v2/orders")
            .json(req)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let envelope: OrderEnvelope = read_json(SERVICE, resp).await?;
        Ok(envelope.order)
    }

    async fn update_order(
        &self,
        order_id: &str,
        req: &UpdateOrderRequest,
    ) -> Result<PosOrder, ClientError> {
        let resp = self
            .request(reqwest::Method::PUT, &format!("/v2/orders/{order_id}"))
            .json(req)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let envelope: OrderEnvelope = read_json(SERVICE, resp).await?;
        Ok(envelope.order)
    }

    async fn create_payment(&self, req: &CreatePaymentRequest) -> Result<PosPayment, ClientError> {
        let resp = self
            .request(reqwest::Method::POST, "/v2/payments")
            .json(req)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        let envelope: PaymentEnvelope = read_json(SERVICE, resp).await?;
        Ok(envelope.payment)
    }
}
