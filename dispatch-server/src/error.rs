//! Dispatch error taxonomy
//!
//! Only conditions that abort a dispatch are errors. A failed fee lookup or
//! delivery submission is a degraded outcome, logged and surfaced as an
//! outcome flag instead.

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::clients::ClientError;
use crate::ledger::StorageError;

/// Pipeline step that talked to an external system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamStep {
    PosOrder,
    PosFulfillment,
    PosPayment,
    Delivery,
}

impl UpstreamStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PosOrder => "pos_order",
            Self::PosFulfillment => "pos_fulfillment",
            Self::PosPayment => "pos_payment",
            Self::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for UpstreamStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Malformed inbound event; rejected before any side effect
    #[error("Invalid order event: {0}")]
    Validation(String),

    /// Missing location setup; retrying will not help
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{step} failed")]
    Upstream {
        step: UpstreamStep,
        #[source]
        source: ClientError,
    },

    #[error("Audit storage failed")]
    Storage(#[from] StorageError),
}

impl DispatchError {
    pub fn upstream(step: UpstreamStep) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::Upstream { step, source }
    }
}

/// Message plus every `source()` beneath it, one per line
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        let message = error_chain(&err);
        match err {
            DispatchError::Validation(msg) => AppError::validation(msg),
            DispatchError::Configuration(_) => AppError::config(message),
            DispatchError::Upstream { step, source } => {
                let code = match step {
                    UpstreamStep::PosPayment => ErrorCode::PaymentFailed,
                    UpstreamStep::PosOrder | UpstreamStep::PosFulfillment => {
                        ErrorCode::PosOrderFailed
                    }
                    UpstreamStep::Delivery => ErrorCode::DeliveryUnavailable,
                };
                AppError::with_message(code, message)
                    .with_detail("step", step.as_str())
                    .with_detail("service", source.service())
            }
            DispatchError::Storage(_) => AppError::database(message),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::database(err.to_string())
    }
}
