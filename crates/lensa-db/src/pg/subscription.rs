//! PostgreSQL subscription repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbResult;
use crate::models::SubscriptionRow;
use crate::repo::{CreateSubscription, SubscriptionRepository};

const SUB_COLUMNS: &str = "id, order_id, user_id, status, amount, payment_method, payment_code, \
     reference, payment_url, va_number, qr_string, expires_at, paid_at, \
     subscription_start, subscription_end, auto_renewal_enabled, renewal_attempted, \
     renewal_attempt_count, last_renewal_attempt, renewal_of, grace_period_start, \
     grace_period_end, cancelled_at, cancelled_by, cancellation_reason, \
     refund_reference, refunded_at, refund_amount, refund_status, reminder_7d_sent, \
     reminder_3d_sent, reminder_1d_sent, ending_notice_sent, created_at, updated_at";

/// PostgreSQL subscription repository
#[derive(Clone)]
pub struct PgSubscriptionRepository {
    pool: PgPool,
}

impl PgSubscriptionRepository {
    /// Create a new subscription repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriptionRepository for PgSubscriptionRepository {
    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_live_pending_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = 'pending' AND expires_at > $2 \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND status = 'success' AND subscription_end > $2 \
             ORDER BY subscription_end DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_current_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND ( \
                 (status IN ('success', 'cancelled') AND subscription_end > $2) \
                 OR (status = 'grace_period' AND grace_period_end > $2) \
                 OR (status = 'success' AND auto_renewal_enabled \
                     AND subscription_end > $2 - INTERVAL '3 days') \
             ) \
             ORDER BY subscription_end DESC NULLS LAST LIMIT 1"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "INSERT INTO subscriptions (id, order_id, user_id, amount, payment_method, \
                 payment_code, reference, payment_url, va_number, qr_string, expires_at, \
                 auto_renewal_enabled, renewal_of) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {SUB_COLUMNS}"
        ))
        .bind(sub.id)
        .bind(&sub.order_id)
        .bind(sub.user_id)
        .bind(sub.amount)
        .bind(&sub.payment_method)
        .bind(&sub.payment_code)
        .bind(&sub.reference)
        .bind(&sub.payment_url)
        .bind(&sub.va_number)
        .bind(&sub.qr_string)
        .bind(sub.expires_at)
        .bind(sub.auto_renewal_enabled)
        .bind(&sub.renewal_of)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn update(&self, sub: &SubscriptionRow) -> DbResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET \
                 status = $2, payment_method = $3, payment_code = $4, reference = $5, \
                 payment_url = $6, va_number = $7, qr_string = $8, expires_at = $9, \
                 paid_at = $10, subscription_start = $11, subscription_end = $12, \
                 auto_renewal_enabled = $13, renewal_attempted = $14, \
                 renewal_attempt_count = $15, last_renewal_attempt = $16, \
                 grace_period_start = $17, grace_period_end = $18, cancelled_at = $19, \
                 cancelled_by = $20, cancellation_reason = $21, refund_reference = $22, \
                 refunded_at = $23, refund_amount = $24, refund_status = $25, \
                 reminder_7d_sent = $26, reminder_3d_sent = $27, reminder_1d_sent = $28, \
                 ending_notice_sent = $29, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(sub.id)
        .bind(&sub.status)
        .bind(&sub.payment_method)
        .bind(&sub.payment_code)
        .bind(&sub.reference)
        .bind(&sub.payment_url)
        .bind(&sub.va_number)
        .bind(&sub.qr_string)
        .bind(sub.expires_at)
        .bind(sub.paid_at)
        .bind(sub.subscription_start)
        .bind(sub.subscription_end)
        .bind(sub.auto_renewal_enabled)
        .bind(sub.renewal_attempted)
        .bind(sub.renewal_attempt_count)
        .bind(sub.last_renewal_attempt)
        .bind(sub.grace_period_start)
        .bind(sub.grace_period_end)
        .bind(sub.cancelled_at)
        .bind(&sub.cancelled_by)
        .bind(&sub.cancellation_reason)
        .bind(&sub.refund_reference)
        .bind(sub.refunded_at)
        .bind(sub.refund_amount)
        .bind(&sub.refund_status)
        .bind(sub.reminder_7d_sent)
        .bind(sub.reminder_3d_sent)
        .bind(sub.reminder_1d_sent)
        .bind(sub.ending_notice_sent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_latest_renewal_of(
        &self,
        source_order_id: &str,
    ) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE renewal_of = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(source_order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_latest_paid_by_user(
        &self,
        user_id: Uuid,
    ) -> DbResult<Option<SubscriptionRow>> {
        let sub = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE user_id = $1 AND paid_at IS NOT NULL \
             ORDER BY paid_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sub)
    }

    async fn find_ending_with_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(horizon_days);
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'success' AND auto_renewal_enabled \
               AND subscription_end > $1 AND subscription_end <= $2"
        ))
        .bind(now)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn find_renewal_due(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(1);
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'success' AND auto_renewal_enabled AND subscription_end <= $1"
        ))
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn find_ending_without_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(horizon_days);
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'success' AND NOT auto_renewal_enabled \
               AND NOT ending_notice_sent \
               AND subscription_end > $1 AND subscription_end <= $2"
        ))
        .bind(now)
        .bind(horizon)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn find_grace_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'grace_period' AND grace_period_end <= $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn find_stale_pending(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'pending' AND expires_at <= $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn find_cancelled_past_end(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let subs = sqlx::query_as::<_, SubscriptionRow>(&format!(
            "SELECT {SUB_COLUMNS} FROM subscriptions \
             WHERE status = 'cancelled' AND subscription_end <= $1"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(subs)
    }

    async fn has_live_subscription(&self, user_id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
        // The auto-renew arm is bounded by the grace window: once the end is
        // further in the past than a grace period could reach, the record no
        // longer grants access even if its renewal never settled.
        let found: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM subscriptions \
             WHERE user_id = $1 AND ( \
                 (status IN ('success', 'cancelled') AND subscription_end > $2) \
                 OR (status = 'grace_period' AND grace_period_end > $2) \
                 OR (status = 'success' AND auto_renewal_enabled \
                     AND subscription_end > $2 - INTERVAL '3 days') \
             ) LIMIT 1",
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }
}
