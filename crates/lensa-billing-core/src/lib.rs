//! Lensa Billing Core - Subscription lifecycle business logic
//!
//! The subscription state machine for Lensa premium accounts, with the
//! Duitku gateway client, callback signature verification, the notification
//! boundary, and the daily maintenance sweep.
//!
//! # Example
//!
//! ```rust,ignore
//! use lensa_billing_core::{BillingConfig, DuitkuProvider, LogNotifier, SubscriptionService, SystemClock};
//! use std::sync::Arc;
//!
//! let config = BillingConfig::new("D1234", "secret-api-key")
//!     .with_urls("https://api.lensa.app/subscription/callback", "https://lensa.app/premium");
//!
//! let provider = Arc::new(DuitkuProvider::new(config.clone()));
//! let service = SubscriptionService::new(
//!     subscriptions,
//!     users,
//!     provider,
//!     Arc::new(LogNotifier),
//!     Arc::new(SystemClock),
//!     config,
//! );
//!
//! let payment = service.create_payment(user_id, "VC").await?;
//! ```

pub mod callback;
pub mod clock;
pub mod config;
pub mod duitku;
pub mod error;
pub mod notify;
pub mod provider;
pub mod service;
pub mod sweep;

pub use callback::{CallbackPayload, CallbackVerifier};
pub use clock::{Clock, SystemClock};
pub use config::BillingConfig;
pub use duitku::DuitkuProvider;
pub use error::BillingError;
pub use notify::{LogNotifier, NotificationEvent, Notifier};
pub use provider::{
    CreateTransaction, GatewayStatus, PaymentMethod, PaymentProvider, RefundReceipt,
    TransactionHandle,
};
pub use service::{can_refund, PaymentCreated, RefundEligibility, SubscriptionService};
pub use sweep::{MaintenanceSweep, SweepReport};
