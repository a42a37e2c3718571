//! Gateway callback verification
//!
//! Duitku signs callbacks with `md5(merchantCode + amount + merchantOrderId +
//! apiKey)`. The signature is verified in constant time before any state is
//! touched; a mismatch rejects the callback outright.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BillingError;
use crate::provider::GatewayStatus;

/// Inbound callback payload, as posted by the gateway (form-encoded)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub merchant_code: String,
    pub amount: String,
    pub merchant_order_id: String,
    #[serde(default)]
    pub payment_code: Option<String>,
    pub result_code: String,
    #[serde(default)]
    pub reference: Option<String>,
    pub signature: String,
    #[serde(default)]
    pub publisher_order_id: Option<String>,
    #[serde(default)]
    pub settlement_date: Option<String>,
    #[serde(default)]
    pub issuer_code: Option<String>,
}

/// Verifies callback signatures and maps result codes
#[derive(Clone)]
pub struct CallbackVerifier {
    merchant_code: String,
    api_key: String,
}

impl CallbackVerifier {
    /// Create a new verifier
    pub fn new(merchant_code: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            merchant_code: merchant_code.into(),
            api_key: api_key.into(),
        }
    }

    /// Compute the expected signature for an order id and amount
    ///
    /// Also used by the simulation endpoint to construct a valid callback.
    pub fn sign(&self, order_id: &str, amount: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(self.merchant_code.as_bytes());
        hasher.update(amount.as_bytes());
        hasher.update(order_id.as_bytes());
        hasher.update(self.api_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify a callback's signature and map its result code
    ///
    /// Rejection means no state change anywhere downstream.
    pub fn verify(&self, payload: &CallbackPayload) -> Result<GatewayStatus, BillingError> {
        if payload.merchant_code != self.merchant_code {
            warn!(merchant_code = %payload.merchant_code, "Callback for unknown merchant code");
            return Err(BillingError::InvalidSignature);
        }

        let expected = self.sign(&payload.merchant_order_id, &payload.amount);
        if !constant_time_eq(payload.signature.as_bytes(), expected.as_bytes()) {
            warn!(order_id = %payload.merchant_order_id, "Callback signature verification failed");
            return Err(BillingError::InvalidSignature);
        }

        let status = GatewayStatus::from_result_code(&payload.result_code);
        debug!(
            order_id = %payload.merchant_order_id,
            result_code = %payload.result_code,
            ?status,
            "Callback verified"
        );
        Ok(status)
    }
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}
