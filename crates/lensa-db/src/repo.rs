//! Repository traits
//!
//! Define async repository interfaces for database operations. The lifecycle
//! engine and maintenance sweep depend only on these traits, so tests can run
//! against in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::*;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find a user by ID
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>>;

    /// Find a user by API token hash
    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<UserRow>>;

    /// Update user role
    async fn update_role(&self, id: Uuid, role: &str) -> DbResult<()>;

    /// List all users currently holding the premium role
    async fn list_premium(&self) -> DbResult<Vec<UserRow>>;
}

/// Subscription repository trait
///
/// Scan methods take `now` explicitly so the engine's injected clock, not the
/// database's, decides what "today" means.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Find a subscription by merchant order id
    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<SubscriptionRow>>;

    /// Find a user's pending record whose payment link has not yet expired
    async fn find_live_pending_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// Find a user's paid record with a subscription end in the future
    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// Find the record that currently grants the user access: a success or
    /// cancelled record with a future end date, or a live grace-period record
    async fn find_current_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// List a user's subscription records, newest first
    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SubscriptionRow>>;

    /// Create a new subscription record in `pending`
    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow>;

    /// Persist the full row; the engine mutates in memory and saves once
    async fn update(&self, sub: &SubscriptionRow) -> DbResult<()>;

    /// The most recent renewal record created from the given source order id,
    /// whatever its status
    async fn find_latest_renewal_of(
        &self,
        source_order_id: &str,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// The user's most recent record that was actually paid
    async fn find_latest_paid_by_user(
        &self,
        user_id: Uuid,
    ) -> DbResult<Option<SubscriptionRow>>;

    /// Paid auto-renew records ending within `horizon_days` of `now`
    async fn find_ending_with_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>>;

    /// Paid auto-renew records due for a renewal attempt: ending within one
    /// day, including records whose end has already passed with the renewal
    /// still unresolved
    async fn find_renewal_due(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>>;

    /// Paid records with auto-renew disabled, ending within `horizon_days`,
    /// whose ending notice has not been sent
    async fn find_ending_without_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>>;

    /// Grace-period records whose grace window has closed
    async fn find_grace_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>>;

    /// Pending records whose payment link expired without resolution
    async fn find_stale_pending(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>>;

    /// Cancelled records whose subscription end has passed
    async fn find_cancelled_past_end(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>>;

    /// Whether the user has any record still granting access: success or
    /// cancelled with a future end, a live grace period, or a paid auto-renew
    /// record whose renewal is still being attempted. The last case is bounded
    /// to ends no further than the grace window in the past, so a record whose
    /// renewal never settles cannot grant access forever
    async fn has_live_subscription(&self, user_id: Uuid, now: DateTime<Utc>) -> DbResult<bool>;
}

/// Create subscription input
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub id: Uuid,
    pub order_id: String,
    pub user_id: Uuid,
    pub amount: i64,
    pub payment_method: Option<String>,
    pub payment_code: Option<String>,
    pub reference: Option<String>,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renewal_enabled: bool,
    pub renewal_of: Option<String>,
}
