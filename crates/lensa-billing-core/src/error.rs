//! Billing errors

use thiserror::Error;

/// Billing errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// No subscription record matches the order id
    #[error("subscription not found")]
    SubscriptionNotFound,

    /// User has no active subscription to operate on
    #[error("no active subscription")]
    NoActiveSubscription,

    /// User not found
    #[error("user not found")]
    UserNotFound,

    /// User already holds an active premium subscription
    #[error("user already has an active subscription")]
    AlreadySubscribed,

    /// A pending payment link is still live for this user
    #[error("a pending payment already exists")]
    PendingPaymentExists,

    /// Subscription was already cancelled
    #[error("subscription already cancelled")]
    AlreadyCancelled,

    /// Subscription was already refunded
    #[error("subscription already refunded")]
    AlreadyRefunded,

    /// Refund requested after the eligibility window closed
    #[error("refund window expired")]
    RefundWindowExpired,

    /// Callback signature did not verify
    #[error("invalid callback signature")]
    InvalidSignature,

    /// Gateway call failed; no state was changed, the operation is retryable
    #[error("gateway error: {0}")]
    Provider(String),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] lensa_db::DbError),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionNotFound | Self::NoActiveSubscription | Self::UserNotFound
        )
    }

    /// Check if this is a conflict (invalid transition) error
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadySubscribed
                | Self::PendingPaymentExists
                | Self::AlreadyCancelled
                | Self::AlreadyRefunded
        )
    }
}
