//! Duitku payment provider implementation

use std::sync::Arc;

use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info, instrument};

use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{
    CreateTransaction, GatewayStatus, PaymentMethod, PaymentProvider, RefundReceipt,
    TransactionHandle,
};

/// Duitku payment provider
///
/// Takes the clock as a collaborator; the signed datetime on the
/// payment-method request is the only place the gateway client needs time.
#[derive(Clone)]
pub struct DuitkuProvider {
    client: Client,
    config: BillingConfig,
    clock: Arc<dyn Clock>,
}

impl DuitkuProvider {
    /// Create a new Duitku provider
    pub fn new(config: BillingConfig, clock: Arc<dyn Clock>) -> Self {
        let client = Client::new();
        Self {
            client,
            config,
            clock,
        }
    }

    /// MD5 digest over the concatenated parts, hex-encoded
    fn md5_signature(parts: &[&str]) -> String {
        let mut hasher = Md5::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// SHA-256 digest over the concatenated parts, hex-encoded
    fn sha256_signature(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Timestamped signature for the payment-method endpoint
    fn payment_method_signature(&self, amount: i64) -> (String, String) {
        let datetime = self.clock.now().format("%Y-%m-%d %H:%M:%S").to_string();
        let signature = Self::sha256_signature(&[
            &self.config.merchant_code,
            &amount.to_string(),
            &datetime,
            &self.config.api_key,
        ]);
        (datetime, signature)
    }

    /// Make a JSON request to the Duitku API
    async fn duitku_request<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, BillingError> {
        let url = format!("{}{endpoint}", self.config.api_base);

        let response = self.client.post(&url).json(body).send().await.map_err(|e| {
            error!(error = %e, endpoint = %endpoint, "Duitku API request failed");
            BillingError::Provider(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Duitku API error");
            return Err(BillingError::Provider(format!("Duitku API error: {status}")));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Duitku response");
            BillingError::Provider(e.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for DuitkuProvider {
    #[instrument(skip(self, req), fields(order_id = %req.order_id))]
    async fn create_transaction(
        &self,
        req: CreateTransaction,
    ) -> Result<TransactionHandle, BillingError> {
        debug!(amount = req.amount, method = %req.payment_method, "Creating Duitku transaction");

        let amount = req.amount.to_string();
        let signature = Self::md5_signature(&[
            &self.config.merchant_code,
            &req.order_id,
            &amount,
            &self.config.api_key,
        ]);

        let body = DuitkuInquiryRequest {
            merchant_code: self.config.merchant_code.clone(),
            payment_amount: req.amount,
            payment_method: req.payment_method,
            merchant_order_id: req.order_id,
            product_details: "Lensa Premium (30 days)".to_string(),
            email: req.email,
            customer_va_name: req.customer_name,
            callback_url: self.config.callback_url.clone(),
            return_url: self.config.return_url.clone(),
            expiry_period: req.expiry_minutes,
            signature,
        };

        let resp: DuitkuInquiryResponse = self.duitku_request("/v2/inquiry", &body).await?;

        if resp.status_code != "00" {
            return Err(BillingError::Provider(format!(
                "transaction rejected: {}",
                resp.status_message.unwrap_or_default()
            )));
        }

        Ok(TransactionHandle {
            reference: resp.reference.unwrap_or_default(),
            payment_url: resp.payment_url,
            va_number: resp.va_number,
            qr_string: resp.qr_string,
        })
    }

    #[instrument(skip(self))]
    async fn payment_methods(&self, amount: i64) -> Result<Vec<PaymentMethod>, BillingError> {
        let (datetime, signature) = self.payment_method_signature(amount);

        let body = DuitkuPaymentMethodRequest {
            merchantcode: self.config.merchant_code.clone(),
            amount,
            datetime,
            signature,
        };

        let resp: DuitkuPaymentMethodResponse = self
            .duitku_request("/paymentmethod/getpaymentmethod", &body)
            .await?;

        Ok(resp
            .payment_fee
            .into_iter()
            .map(|m| PaymentMethod {
                code: m.payment_method,
                name: m.payment_name,
                fee: m.total_fee.parse().unwrap_or(0),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, BillingError> {
        let signature = Self::md5_signature(&[
            &self.config.merchant_code,
            order_id,
            &self.config.api_key,
        ]);

        let body = DuitkuStatusRequest {
            merchant_code: self.config.merchant_code.clone(),
            merchant_order_id: order_id.to_string(),
            signature,
        };

        let resp: DuitkuStatusResponse =
            self.duitku_request("/transactionStatus", &body).await?;

        Ok(GatewayStatus::from_result_code(&resp.status_code))
    }

    #[instrument(skip(self))]
    async fn request_refund(
        &self,
        reference: &str,
        amount: i64,
        reason: &str,
    ) -> Result<RefundReceipt, BillingError> {
        // Sandbox has no refund endpoint; simulate approval so the full
        // cancellation flow is exercisable end to end.
        if self.config.sandbox {
            info!(reference = %reference, amount, "Sandbox refund approved (simulated)");
            return Ok(RefundReceipt {
                reference: format!("RF-SANDBOX-{reference}"),
            });
        }

        let amount_str = amount.to_string();
        let signature = Self::md5_signature(&[
            &self.config.merchant_code,
            reference,
            &amount_str,
            &self.config.api_key,
        ]);

        let body = DuitkuRefundRequest {
            merchant_code: self.config.merchant_code.clone(),
            reference: reference.to_string(),
            amount,
            reason: reason.to_string(),
            signature,
        };

        let resp: DuitkuRefundResponse = self.duitku_request("/refund", &body).await?;

        if resp.status_code != "00" {
            return Err(BillingError::Provider(format!(
                "refund rejected: {}",
                resp.status_message.unwrap_or_default()
            )));
        }

        Ok(RefundReceipt {
            reference: resp.refund_reference.unwrap_or_default(),
        })
    }
}

// Duitku API wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuInquiryRequest {
    merchant_code: String,
    payment_amount: i64,
    payment_method: String,
    merchant_order_id: String,
    product_details: String,
    email: String,
    customer_va_name: String,
    callback_url: String,
    return_url: String,
    expiry_period: i64,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuInquiryResponse {
    status_code: String,
    status_message: Option<String>,
    reference: Option<String>,
    payment_url: Option<String>,
    va_number: Option<String>,
    qr_string: Option<String>,
}

// The payment-method endpoint predates Duitku's camelCase convention and
// takes lowercase field names.
#[derive(Debug, Serialize)]
struct DuitkuPaymentMethodRequest {
    merchantcode: String,
    amount: i64,
    datetime: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuPaymentMethodResponse {
    #[serde(default)]
    payment_fee: Vec<DuitkuPaymentFee>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuPaymentFee {
    payment_method: String,
    payment_name: String,
    total_fee: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuStatusRequest {
    merchant_code: String,
    merchant_order_id: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuStatusResponse {
    status_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuRefundRequest {
    merchant_code: String,
    reference: String,
    amount: i64,
    reason: String,
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DuitkuRefundResponse {
    status_code: String,
    status_message: Option<String>,
    refund_reference: Option<String>,
}
