//! Subscription handlers

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use lensa_db::SubscriptionRow;

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::state::AppState;

const MAX_HISTORY_LIMIT: i64 = 50;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedResponse {
    pub order_id: String,
    pub reference: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub va_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_string: Option<String>,
    pub expires_at: String,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub order_id: String,
    pub status: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_end: Option<String>,
    pub auto_renewal_enabled: bool,
    pub is_renewal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<String>,
}

impl From<SubscriptionRow> for SubscriptionResponse {
    fn from(row: SubscriptionRow) -> Self {
        Self {
            status: row.subscription_status().to_string(),
            is_renewal: row.is_renewal(),
            order_id: row.order_id,
            amount: row.amount,
            payment_method: row.payment_method,
            payment_url: row.payment_url,
            subscription_start: row.subscription_start.map(|t| t.to_rfc3339()),
            subscription_end: row.subscription_end.map(|t| t.to_rfc3339()),
            auto_renewal_enabled: row.auto_renewal_enabled,
            cancelled_at: row.cancelled_at.map(|t| t.to_rfc3339()),
            refunded_at: row.refunded_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CurrentSubscriptionResponse {
    pub has_subscription: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionResponse>,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub refund: bool,
}

#[derive(Debug, Deserialize)]
pub struct AutoRenewalRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct RefundEligibilityResponse {
    pub eligible: bool,
    pub days_since_payment: i64,
    pub days_remaining: i64,
    pub refund_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct PaymentMethodResponse {
    pub code: String,
    pub name: String,
    pub fee: i64,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/subscription
pub async fn create_subscription(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> ApiResult<Json<PaymentCreatedResponse>> {
    let start = Instant::now();

    if req.payment_method.is_empty() || req.payment_method.len() > 4 {
        return Err(ApiError::BadRequest("Invalid payment method code".to_string()));
    }

    let payment = state
        .subscriptions
        .create_payment(user.user_id, &req.payment_method)
        .await?;

    metrics::counter!("lensa_payments_created_total").increment(1);
    metrics::histogram!("lensa_operation_duration_seconds", "operation" => "create_payment")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(user_id = %user.user_id, order_id = %payment.order_id, "Payment created");

    Ok(Json(PaymentCreatedResponse {
        order_id: payment.order_id,
        reference: payment.reference,
        amount: payment.amount,
        payment_url: payment.payment_url,
        va_number: payment.va_number,
        qr_string: payment.qr_string,
        expires_at: payment.expires_at.to_rfc3339(),
    }))
}

/// GET /api/v1/subscription/status/{order_id}
///
/// Polls the gateway for pending records, recovering from missed callbacks.
pub async fn check_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();

    let row = state.subscriptions.check_status(user.user_id, &order_id).await?;

    metrics::histogram!("lensa_operation_duration_seconds", "operation" => "check_status")
        .record(start.elapsed().as_secs_f64());

    Ok(Json(row.into()))
}

/// GET /api/v1/subscription/current
pub async fn current_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CurrentSubscriptionResponse>> {
    let current = state.subscriptions.current_subscription(user.user_id).await?;

    Ok(Json(CurrentSubscriptionResponse {
        has_subscription: current.is_some(),
        subscription: current.map(Into::into),
    }))
}

/// GET /api/v1/subscription/history
pub async fn subscription_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<Vec<SubscriptionResponse>>> {
    let rows = state
        .subscriptions
        .history(user.user_id, MAX_HISTORY_LIMIT)
        .await?;

    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/subscription/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let start = Instant::now();

    if req.reason.as_ref().is_some_and(|r| r.len() > 500) {
        return Err(ApiError::BadRequest("Cancellation reason too long".to_string()));
    }

    let row = state
        .subscriptions
        .cancel(user.user_id, req.reason, req.refund)
        .await?;

    metrics::counter!("lensa_subscriptions_cancelled_total", "refund" => if req.refund { "yes" } else { "no" })
        .increment(1);
    metrics::histogram!("lensa_operation_duration_seconds", "operation" => "cancel")
        .record(start.elapsed().as_secs_f64());

    tracing::info!(user_id = %user.user_id, order_id = %row.order_id, refund = req.refund, "Subscription cancelled");

    Ok(Json(row.into()))
}

/// POST /api/v1/subscription/auto-renewal
pub async fn set_auto_renewal(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AutoRenewalRequest>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let row = state
        .subscriptions
        .set_auto_renewal(user.user_id, req.enabled)
        .await?;

    tracing::info!(user_id = %user.user_id, enabled = req.enabled, "Auto-renewal updated");

    Ok(Json(row.into()))
}

/// GET /api/v1/subscription/refund-eligibility
pub async fn refund_eligibility(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<RefundEligibilityResponse>> {
    let elig = state.subscriptions.refund_eligibility(user.user_id).await?;

    Ok(Json(RefundEligibilityResponse {
        eligible: elig.eligible,
        days_since_payment: elig.days_since_payment,
        days_remaining: elig.days_remaining,
        refund_amount: elig.refund_amount,
    }))
}

/// GET /api/v1/subscription/payment-methods
pub async fn payment_methods(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Json<Vec<PaymentMethodResponse>>> {
    let methods = state.subscriptions.payment_methods().await?;

    Ok(Json(
        methods
            .into_iter()
            .map(|m| PaymentMethodResponse {
                code: m.code,
                name: m.name,
                fee: m.fee,
            })
            .collect(),
    ))
}

/// GET /api/v1/subscription/{order_id}
pub async fn subscription_details(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<SubscriptionResponse>> {
    let row = state
        .subscriptions
        .subscription_details(user.user_id, &order_id)
        .await?;

    Ok(Json(row.into()))
}
