//! Billing configuration

/// Duitku sandbox API base
pub const SANDBOX_API_BASE: &str = "https://sandbox.duitku.com/webapi/api/merchant";
/// Duitku production API base
pub const PRODUCTION_API_BASE: &str = "https://passport.duitku.com/webapi/api/merchant";

/// Billing service configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Duitku merchant code
    pub merchant_code: String,
    /// Duitku API key (signing secret)
    pub api_key: String,
    /// Gateway API base URL
    pub api_base: String,
    /// Sandbox mode: refunds are simulated without a network call
    pub sandbox: bool,
    /// URL the gateway posts payment callbacks to
    pub callback_url: String,
    /// URL the gateway redirects the payer back to
    pub return_url: String,
    /// Monthly premium price in IDR
    pub premium_price: i64,
    /// Subscription period length in days
    pub period_days: i64,
    /// Payment link lifetime in minutes
    pub payment_expiry_minutes: i64,
    /// Refund window after payment, in whole days
    pub refund_window_days: i64,
    /// Grace period after repeated renewal failures, in days
    pub grace_days: i64,
    /// Renewal attempts before entering the grace period
    pub max_renewal_attempts: i32,
}

impl BillingConfig {
    /// Create a new billing config with sandbox defaults
    pub fn new(merchant_code: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            merchant_code: merchant_code.into(),
            api_key: api_key.into(),
            api_base: SANDBOX_API_BASE.to_string(),
            sandbox: true,
            callback_url: "https://api.lensa.app/subscription/callback".to_string(),
            return_url: "https://lensa.app/premium".to_string(),
            premium_price: 45_000,
            period_days: 30,
            payment_expiry_minutes: 1_440,
            refund_window_days: 5,
            grace_days: 3,
            max_renewal_attempts: 3,
        }
    }

    /// Switch to the production gateway
    pub fn production(mut self) -> Self {
        self.api_base = PRODUCTION_API_BASE.to_string();
        self.sandbox = false;
        self
    }

    /// Set callback and return URLs
    pub fn with_urls(
        mut self,
        callback_url: impl Into<String>,
        return_url: impl Into<String>,
    ) -> Self {
        self.callback_url = callback_url.into();
        self.return_url = return_url.into();
        self
    }

    /// Override the premium price
    pub fn with_price(mut self, price: i64) -> Self {
        self.premium_price = price;
        self
    }
}
