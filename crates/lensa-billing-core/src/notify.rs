//! Notification boundary
//!
//! The engine emits lifecycle events; delivery (email, push) lives behind
//! this trait. Notification failures are logged and never block a lifecycle
//! transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use lensa_db::UserRow;

use crate::error::BillingError;

/// Lifecycle events worth telling the user about
#[derive(Debug, Clone)]
pub enum NotificationEvent {
    /// Payment confirmed, premium active
    PaymentConfirmed {
        order_id: String,
        ends_at: DateTime<Utc>,
    },
    /// Auto-renewal is coming up
    RenewalReminder {
        days_left: i64,
        ends_at: DateTime<Utc>,
    },
    /// Subscription ending soon with auto-renewal off
    SubscriptionEnding { ends_at: DateTime<Utc> },
    /// A renewal payment link was created
    RenewalPaymentCreated {
        order_id: String,
        payment_url: Option<String>,
    },
    /// Renewal kept failing; grace period started
    GracePeriodStarted { until: DateTime<Utc> },
    /// Premium access ended
    SubscriptionExpired,
    /// Refund granted
    RefundIssued { amount: i64 },
}

/// Notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event to one user
    async fn notify(&self, user: &UserRow, event: NotificationEvent) -> Result<(), BillingError>;
}

/// Notifier that only writes structured logs
///
/// Stands in for the mail pipeline in environments without outbound email.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user: &UserRow, event: NotificationEvent) -> Result<(), BillingError> {
        info!(user_id = %user.id, email = %user.email, ?event, "notification");
        Ok(())
    }
}
