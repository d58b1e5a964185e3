//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors surfaced by the payment workflow
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Caller input failed validation; carries every violated rule
    #[error("{}", .0.join("; "))]
    InvalidRequest(Vec<String>),

    /// Collaborator credentials are missing from the environment
    #[error("Server configuration error: {0}")]
    Config(String),

    /// Payment gateway unreachable or rejected the request
    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Gateway reports the transaction has not settled yet
    #[error("Payment not completed yet.")]
    PaymentIncomplete,

    /// Unknown reference
    #[error("{0} not found")]
    NotFound(String),

    /// Store read/write failed
    #[error("Storage error: {0}")]
    Persistence(String),

    /// Mailing list API failed
    #[error("Mailing list error: {0}")]
    MailingList(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PaymentError {
    /// Single-violation validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(vec![message.into()])
    }

    /// HTTP status code for this error
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::PaymentIncomplete => 400,
            Self::NotFound(_) => 404,
            Self::Gateway(_) => 502,
            Self::Config(_)
            | Self::Persistence(_)
            | Self::MailingList(_)
            | Self::Serialization(_) => 500,
        }
    }

    /// Whether the caller may retry the same request later
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PaymentIncomplete | Self::Gateway(_) | Self::Persistence(_) | Self::MailingList(_)
        )
    }

    /// Per-rule violations, when this is a validation error
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            Self::InvalidRequest(violations) => Some(violations),
            _ => None,
        }
    }
}

#[cfg(feature = "axum-handlers")]
mod response {
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use serde::Serialize;

    use super::PaymentError;

    #[derive(Debug, Serialize)]
    struct ErrorBody {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Vec<String>>,
    }

    impl IntoResponse for PaymentError {
        fn into_response(self) -> Response {
            let status = StatusCode::from_u16(self.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

            if status.is_server_error() {
                tracing::error!(%status, error = %self, "Request failed");
            } else {
                tracing::warn!(%status, error = %self, "Request rejected");
            }

            let body = ErrorBody {
                error: self.to_string(),
                details: self.violations().map(<[String]>::to_vec),
            };

            (status, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_lists_every_violation() {
        let err = PaymentError::InvalidRequest(vec![
            "email must be a valid address".into(),
            "amount must be a positive number".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "email must be a valid address; amount must be a positive number"
        );
        assert_eq!(err.violations().map(<[String]>::len), Some(2));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PaymentError::Config("x".into()).status_code(), 500);
        assert_eq!(PaymentError::Gateway("x".into()).status_code(), 502);
        assert_eq!(PaymentError::PaymentIncomplete.status_code(), 400);
        assert_eq!(PaymentError::NotFound("Transaction".into()).status_code(), 404);
        assert_eq!(PaymentError::Persistence("x".into()).status_code(), 500);
    }

    #[test]
    fn test_payment_incomplete_message() {
        assert_eq!(
            PaymentError::PaymentIncomplete.to_string(),
            "Payment not completed yet."
        );
        assert!(PaymentError::PaymentIncomplete.is_retryable());
        assert!(!PaymentError::invalid("bad").is_retryable());
    }
}
