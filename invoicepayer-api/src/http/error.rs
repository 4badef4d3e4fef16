// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Errors a handler reports to the caller. The message is the response
/// body, so internal details never go in it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed to decode invoice: {0}")]
    InvalidInvoice(String),

    #[error("failed to pay: {0}")]
    PaymentFailed(String),

    #[error("failed to reach node: {0}")]
    NodeUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidInvoice(_) | Self::PaymentFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NodeUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.to_string(),
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<invoicepayer_core::Error> for AppError {
    fn from(err: invoicepayer_core::Error) -> Self {
        use invoicepayer_core::Error;

        match err {
            Error::InvalidInput(msg) => Self::BadRequest(msg),
            Error::Decode(msg) => Self::InvalidInvoice(msg),
            Error::PaymentFailed(msg) => Self::PaymentFailed(msg),
            Error::Backend(msg) | Error::Timeout(msg) => {
                tracing::warn!("Node unreachable: {}", msg);
                Self::NodeUnavailable(msg)
            }
            Error::Configuration(msg) | Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Self::Internal
            }
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                Self::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoicepayer_core::Error;

    #[test]
    fn test_payment_failure_is_bad_request() {
        let err = AppError::from(Error::PaymentFailed("no route".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "failed to pay: no route");
    }

    #[test]
    fn test_transport_failure_is_bad_gateway() {
        let err = AppError::from(Error::Timeout("pay".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::from(Error::Internal("task panicked".to_string()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }
}
