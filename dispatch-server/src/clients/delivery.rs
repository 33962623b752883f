//! Delivery dispatch service
//!
//! A single authenticated `POST` with a JSON body. The service accepts no
//! idempotency key, so a retried dispatch can create a duplicate job.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ClientError, http_error, read_json};

const SERVICE: &str = "delivery";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryCustomer {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub address: DeliveryAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryAddress {
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    /// Single-line form for drivers
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Variant and customer-visible options (`Large; Milk: Oat`)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryJob {
    /// POS order id, for cross-referencing jobs with kitchen tickets
    pub external_reference: String,
    pub order_number: String,
    pub pickup_location: String,
    pub customer: DeliveryCustomer,
    pub items: Vec<DeliveryItem>,
    pub delivery_fee: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(alias = "order_id", alias = "job_id")]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[async_trait]
pub trait DeliveryService: Send + Sync {
    async fn create_job(
        &self,
        api_key: &str,
        job: &DeliveryJob,
    ) -> Result<DeliveryReceipt, ClientError>;
}

/// HTTP client for the delivery service
pub struct HttpDeliveryClient {
    client: Client,
    endpoint: String,
}

impl HttpDeliveryClient {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DeliveryService for HttpDeliveryClient {
    async fn create_job(
        &self,
        api_key: &str,
        job: &DeliveryJob,
    ) -> Result<DeliveryReceipt, ClientError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(job)
            .send()
            .await
            .map_err(http_error(SERVICE))?;
        read_json(SERVICE, resp).await
    }
}
