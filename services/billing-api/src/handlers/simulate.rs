//! Payment callback simulation (non-production only)

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use lensa_billing_core::CallbackPayload;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub order_id: String,
    /// Gateway result code; defaults to a successful payment
    #[serde(default = "default_result_code")]
    pub result_code: String,
}

fn default_result_code() -> String {
    "00".to_string()
}

#[derive(Debug, Serialize)]
pub struct SimulateResponse {
    pub order_id: String,
    pub result_code: String,
    pub status: String,
}

/// POST /subscription/simulate
///
/// Builds a correctly signed callback for an existing order and runs it
/// through the normal callback path. Returns 404 in production so the
/// endpoint is indistinguishable from an unknown route.
pub async fn simulate_callback(
    State(state): State<AppState>,
    Json(req): Json<SimulateRequest>,
) -> ApiResult<Json<SimulateResponse>> {
    if state.config.production {
        return Err(ApiError::NotFound);
    }

    let service = &state.subscriptions;
    let amount = state.config.billing.premium_price.to_string();

    let payload = CallbackPayload {
        merchant_code: state.config.billing.merchant_code.clone(),
        signature: service.verifier().sign(&req.order_id, &amount),
        amount,
        merchant_order_id: req.order_id.clone(),
        payment_code: Some("VC".to_string()),
        result_code: req.result_code.clone(),
        reference: Some(format!("SIM-{}", req.order_id)),
        publisher_order_id: None,
        settlement_date: None,
        issuer_code: None,
    };

    service.process_callback(&payload).await?;

    tracing::info!(order_id = %req.order_id, result_code = %req.result_code, "Callback simulated");

    Ok(Json(SimulateResponse {
        order_id: req.order_id,
        result_code: req.result_code,
        status: "processed".to_string(),
    }))
}
