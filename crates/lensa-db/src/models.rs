//! Database row models
//!
//! These types map directly to database rows using SQLx's FromRow derive.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use lensa_types::{SubscriptionStatus, UserId, UserRole};

/// User row from the database (billing-relevant subset)
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
    pub banned: bool,
    pub token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.id)
    }

    /// Parse the stored role; unknown values fall back to the lowest role
    pub fn user_role(&self) -> UserRole {
        self.role.parse().unwrap_or(UserRole::Basic)
    }
}

/// Subscription row from the database
///
/// One row per payment attempt. Rows are never deleted; terminal states stay
/// as history. Lifecycle transitions mutate a fetched row in memory and
/// persist it with a single `update` call.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub order_id: String,
    pub user_id: Uuid,
    pub status: String,
    pub amount: i64,
    pub payment_method: Option<String>,
    pub payment_code: Option<String>,
    pub reference: Option<String>,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub subscription_start: Option<DateTime<Utc>>,
    pub subscription_end: Option<DateTime<Utc>>,
    pub auto_renewal_enabled: bool,
    pub renewal_attempted: bool,
    pub renewal_attempt_count: i32,
    pub last_renewal_attempt: Option<DateTime<Utc>>,
    pub renewal_of: Option<String>,
    pub grace_period_start: Option<DateTime<Utc>>,
    pub grace_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub refund_reference: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refund_status: Option<String>,
    pub reminder_7d_sent: bool,
    pub reminder_3d_sent: bool,
    pub reminder_1d_sent: bool,
    pub ending_notice_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// Convert to domain UserId
    pub fn user_id(&self) -> UserId {
        UserId(self.user_id)
    }

    /// Parse the stored status; an unknown value is treated as expired (inert)
    pub fn subscription_status(&self) -> SubscriptionStatus {
        self.status.parse().unwrap_or(SubscriptionStatus::Expired)
    }

    /// Set the status column from the domain enum
    pub fn set_status(&mut self, status: SubscriptionStatus) {
        self.status = status.to_string();
    }

    /// Whether this row was created as an automatic renewal attempt
    pub fn is_renewal(&self) -> bool {
        self.renewal_of.is_some()
    }
}
