//! Configuration for the Billing API service.

use lensa_billing_core::BillingConfig;
use std::time::Duration;

/// Billing API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// Database URL
    pub database_url: String,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Production mode: disables the callback simulation endpoint
    pub production: bool,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
    /// Daily maintenance sweep enabled
    pub scheduler_enabled: bool,
    /// Maintenance sweep interval
    pub sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Database
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        // Server port
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "8081".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // Duitku gateway credentials
        let merchant_code = std::env::var("DUITKU_MERCHANT_CODE")
            .map_err(|_| ConfigError::Missing("DUITKU_MERCHANT_CODE"))?;

        let api_key =
            std::env::var("DUITKU_API_KEY").map_err(|_| ConfigError::Missing("DUITKU_API_KEY"))?;

        // Environment: anything but "production" stays on the sandbox gateway
        let production = std::env::var("ENVIRONMENT")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        // Callback and return URLs
        let callback_url = std::env::var("DUITKU_CALLBACK_URL")
            .unwrap_or_else(|_| "https://api.lensa.app/subscription/callback".to_string());

        let return_url = std::env::var("DUITKU_RETURN_URL")
            .unwrap_or_else(|_| "https://lensa.app/premium".to_string());

        // Request timeout
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        // Maintenance sweep
        let scheduler_enabled = std::env::var("SCHEDULER_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SWEEP_INTERVAL_SECS"))?;

        // Premium price override, defaults to 45000 IDR
        let premium_price: i64 = std::env::var("PREMIUM_PRICE_IDR")
            .unwrap_or_else(|_| "45000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PREMIUM_PRICE_IDR"))?;

        // Build billing config
        let mut billing = BillingConfig::new(&merchant_code, &api_key)
            .with_urls(&callback_url, &return_url)
            .with_price(premium_price);
        if production {
            billing = billing.production();
        }

        Ok(Self {
            http_port,
            database_url,
            billing,
            production,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
            scheduler_enabled,
            sweep_interval: Duration::from_secs(sweep_interval_secs),
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
