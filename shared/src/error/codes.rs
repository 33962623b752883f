//! Unified error codes for the dispatch service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 4xxx: Dispatch errors
//! - 5xxx: Payment / POS errors
//! - 6xxx: Upstream (external system) errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Validation failed
    ValidationFailed = 2,
    /// Invalid format
    InvalidFormat = 6,

    // ==================== 4xxx: Dispatch ====================
    /// No dispatch record exists for the order
    DispatchRecordNotFound = 4003,
    /// Operator action is not recognized
    UnknownAction = 4004,

    // ==================== 5xxx: Payment / POS ====================
    /// POS order creation or update failed
    PosOrderFailed = 5001,
    /// External payment creation failed
    PaymentFailed = 5002,

    // ==================== 6xxx: Upstream ====================
    /// Delivery dispatch system request failed
    DeliveryUnavailable = 6003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Required configuration is missing
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::InvalidFormat => "Invalid format",

            ErrorCode::DispatchRecordNotFound => "No dispatch record for order",
            ErrorCode::UnknownAction => "Unknown action",

            ErrorCode::PosOrderFailed => "POS order could not be created",
            ErrorCode::PaymentFailed => "External payment could not be recorded",

            ErrorCode::DeliveryUnavailable => "Delivery service request failed",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            2 => Ok(ErrorCode::ValidationFailed),
            6 => Ok(ErrorCode::InvalidFormat),

            // Dispatch
            4003 => Ok(ErrorCode::DispatchRecordNotFound),
            4004 => Ok(ErrorCode::UnknownAction),

            // Payment / POS
            5001 => Ok(ErrorCode::PosOrderFailed),
            5002 => Ok(ErrorCode::PaymentFailed),

            // Upstream
            6003 => Ok(ErrorCode::DeliveryUnavailable),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
