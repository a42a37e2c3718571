//! Duitku payment callback handler

use axum::extract::State;
use axum::http::StatusCode;
use axum::Form;
use std::time::Instant;

use lensa_billing_core::{BillingError, CallbackPayload};

use crate::state::AppState;

/// POST /subscription/callback
///
/// The gateway posts form-encoded payment results here and expects a plain
/// text reply. Signature failures get a 400 so the gateway does not mark the
/// notification delivered; unknown orders get a 404.
pub async fn payment_callback(
    State(state): State<AppState>,
    Form(payload): Form<CallbackPayload>,
) -> (StatusCode, &'static str) {
    let start = Instant::now();

    match state.subscriptions.process_callback(&payload).await {
        Ok(()) => {
            metrics::counter!("lensa_callbacks_processed_total", "status" => "success")
                .increment(1);
            metrics::histogram!(
                "lensa_operation_duration_seconds",
                "operation" => "process_callback"
            )
            .record(start.elapsed().as_secs_f64());

            (StatusCode::OK, "OK")
        }
        Err(BillingError::InvalidSignature) => {
            metrics::counter!("lensa_callbacks_processed_total", "status" => "bad_signature")
                .increment(1);
            (StatusCode::BAD_REQUEST, "Bad Signature")
        }
        Err(BillingError::SubscriptionNotFound) => {
            metrics::counter!("lensa_callbacks_processed_total", "status" => "unknown_order")
                .increment(1);
            tracing::warn!(order_id = %payload.merchant_order_id, "Callback for unknown order");
            (StatusCode::NOT_FOUND, "Order not found")
        }
        Err(e) => {
            tracing::error!(error = ?e, "Callback processing failed");
            metrics::counter!("lensa_callbacks_processed_total", "status" => "error").increment(1);
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        }
    }
}
