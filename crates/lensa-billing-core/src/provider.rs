//! Payment provider abstraction

use async_trait::async_trait;

use crate::BillingError;

/// Payment provider trait
///
/// Abstracts the payment gateway so the lifecycle engine can run against a
/// test double. All methods leave engine state untouched on failure; callers
/// treat `Err` as retryable.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a payment transaction and return the gateway artifacts
    async fn create_transaction(
        &self,
        req: CreateTransaction,
    ) -> Result<TransactionHandle, BillingError>;

    /// List payment methods available for the given amount
    async fn payment_methods(&self, amount: i64) -> Result<Vec<PaymentMethod>, BillingError>;

    /// Fetch the gateway's current view of a transaction
    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, BillingError>;

    /// Request a refund against a gateway reference
    async fn request_refund(
        &self,
        reference: &str,
        amount: i64,
        reason: &str,
    ) -> Result<RefundReceipt, BillingError>;
}

/// Input for creating a gateway transaction
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    /// Merchant order id
    pub order_id: String,
    /// Amount in IDR
    pub amount: i64,
    /// Gateway payment method code (e.g. `VC`, `BT`, `SP`)
    pub payment_method: String,
    /// Payer display name
    pub customer_name: String,
    /// Payer email
    pub email: String,
    /// Payment link lifetime in minutes
    pub expiry_minutes: i64,
}

/// Gateway artifacts for a created transaction
///
/// Which field is populated depends on the payment method: card and e-wallet
/// methods return a redirect URL, bank transfers a VA number, QRIS a QR string.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    /// Gateway-issued reference
    pub reference: String,
    /// Hosted payment page URL
    pub payment_url: Option<String>,
    /// Virtual account number
    pub va_number: Option<String>,
    /// QRIS payload
    pub qr_string: Option<String>,
}

/// Gateway's view of a transaction
///
/// Result-code mapping: `00` is paid, `01` is failed, anything else is still
/// pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Payment settled
    Paid,
    /// Payment failed
    Failed,
    /// Still awaiting payment
    Pending,
}

impl GatewayStatus {
    /// Map a gateway result code
    pub fn from_result_code(code: &str) -> Self {
        match code {
            "00" => Self::Paid,
            "01" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Available payment method
#[derive(Debug, Clone)]
pub struct PaymentMethod {
    /// Gateway method code
    pub code: String,
    /// Human-readable name
    pub name: String,
    /// Gateway fee in IDR
    pub fee: i64,
}

/// Granted refund
#[derive(Debug, Clone)]
pub struct RefundReceipt {
    /// Gateway refund reference
    pub reference: String,
}
