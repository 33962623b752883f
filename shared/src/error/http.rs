//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::DispatchRecordNotFound => StatusCode::NOT_FOUND,

            Self::ValidationFailed | Self::InvalidFormat | Self::UnknownAction => {
                StatusCode::BAD_REQUEST
            }

            Self::DeliveryUnavailable => StatusCode::BAD_GATEWAY,

            Self::PosOrderFailed
            | Self::PaymentFailed
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
