//! Outbound collaborators
//!
//! One narrow trait per external system so the pipeline can be driven by
//! in-memory fakes in tests:
//!
//! - [`CommercePlatform`]: fulfillment assignment, location metadata, order
//!   transactions, order lookup (Shopify Admin API)
//! - [`PosSystem`]: order create/update and external payments (Square API)
//! - [`DeliveryService`]: delivery job creation (single authenticated POST)

pub mod commerce;
pub mod delivery;
pub mod pos;

#[cfg(test)]
pub mod fakes;

pub use commerce::{CommercePlatform, ShopifyClient};
pub use delivery::{DeliveryService, HttpDeliveryClient};
pub use pos::{PosSystem, SquareClient};

use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure talking to an external system
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} response malformed: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl ClientError {
    pub fn service(&self) -> &'static str {
        match self {
            Self::Http { service, .. }
            | Self::Status { service, .. }
            | Self::Malformed { service, .. } => service,
        }
    }

    pub(crate) fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            service,
            status: status.as_u16(),
            body: truncate(&body, 512),
        });
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|source| ClientError::Http { service, source })?;
    serde_json::from_slice(&bytes).map_err(|e| ClientError::malformed(service, e.to_string()))
}

pub(crate) fn http_error(service: &'static str) -> impl FnOnce(reqwest::Error) -> ClientError {
    move |source| ClientError::Http { service, source }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
