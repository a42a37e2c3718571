//! Error types for the Billing API service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lensa_billing_core::BillingError;
use serde::Serialize;

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Billing(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Billing(e) if e.is_conflict() => StatusCode::CONFLICT,
            Self::Billing(BillingError::RefundWindowExpired) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Billing(BillingError::InvalidSignature) => StatusCode::BAD_REQUEST,
            Self::Billing(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "FORBIDDEN",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Billing(BillingError::SubscriptionNotFound) => "SUBSCRIPTION_NOT_FOUND",
            Self::Billing(BillingError::NoActiveSubscription) => "NO_ACTIVE_SUBSCRIPTION",
            Self::Billing(BillingError::UserNotFound) => "USER_NOT_FOUND",
            Self::Billing(BillingError::AlreadySubscribed) => "ALREADY_SUBSCRIBED",
            Self::Billing(BillingError::PendingPaymentExists) => "PENDING_PAYMENT_EXISTS",
            Self::Billing(BillingError::AlreadyCancelled) => "ALREADY_CANCELLED",
            Self::Billing(BillingError::AlreadyRefunded) => "ALREADY_REFUNDED",
            Self::Billing(BillingError::RefundWindowExpired) => "REFUND_WINDOW_EXPIRED",
            Self::Billing(BillingError::InvalidSignature) => "INVALID_SIGNATURE",
            Self::Billing(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Internal API error");
        }

        // Internal detail stays out of the response body
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_errors_map_to_statuses() {
        let cases = [
            (BillingError::SubscriptionNotFound, StatusCode::NOT_FOUND),
            (BillingError::NoActiveSubscription, StatusCode::NOT_FOUND),
            (BillingError::AlreadySubscribed, StatusCode::CONFLICT),
            (BillingError::PendingPaymentExists, StatusCode::CONFLICT),
            (BillingError::AlreadyCancelled, StatusCode::CONFLICT),
            (
                BillingError::RefundWindowExpired,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (BillingError::InvalidSignature, StatusCode::BAD_REQUEST),
            (
                BillingError::Provider("down".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::Billing(err).status_code(), status);
        }
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let response =
            ApiError::Billing(BillingError::Provider("api key D1234".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
