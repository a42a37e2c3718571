//! Subscription lifecycle engine
//!
//! The state machine over subscription records. Every transition fetches one
//! row, mutates it in memory, and persists it with a single `update` call, so
//! a transition either fully applies or not at all. Cross-record steps
//! (renewal creation + marking the source) are guarded by the `renewal_of`
//! idempotency key instead of a transaction.
//!
//! All collaborators are injected: repositories, the payment gateway, the
//! notification sink, and the clock.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use lensa_db::{CreateSubscription, SubscriptionRepository, SubscriptionRow, UserRepository, UserRow};
use lensa_types::{
    renewal_order_id, subscription_order_id, SubscriptionStatus, UserId, UserRole,
};

use crate::callback::{CallbackPayload, CallbackVerifier};
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::notify::{NotificationEvent, Notifier};
use crate::provider::{CreateTransaction, GatewayStatus, PaymentMethod, PaymentProvider};

/// Whether a refund may still be requested
///
/// The window counts whole days since payment; it is monotonically
/// non-increasing in `now`.
pub fn can_refund(paid_at: DateTime<Utc>, now: DateTime<Utc>, window_days: i64) -> bool {
    (now - paid_at).num_days() <= window_days
}

/// A freshly created payment attempt
#[derive(Debug, Clone)]
pub struct PaymentCreated {
    pub order_id: String,
    pub reference: String,
    pub amount: i64,
    pub payment_url: Option<String>,
    pub va_number: Option<String>,
    pub qr_string: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Refund eligibility for the active subscription
#[derive(Debug, Clone)]
pub struct RefundEligibility {
    pub eligible: bool,
    pub days_since_payment: i64,
    pub days_remaining: i64,
    pub refund_amount: i64,
}

/// Subscription lifecycle service
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionRepository>,
    users: Arc<dyn UserRepository>,
    provider: Arc<dyn PaymentProvider>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    verifier: CallbackVerifier,
    config: BillingConfig,
}

impl SubscriptionService {
    /// Create a new subscription service
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        users: Arc<dyn UserRepository>,
        provider: Arc<dyn PaymentProvider>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: BillingConfig,
    ) -> Self {
        let verifier = CallbackVerifier::new(&config.merchant_code, &config.api_key);
        Self {
            subscriptions,
            users,
            provider,
            notifier,
            clock,
            verifier,
            config,
        }
    }

    /// The callback verifier (used by the simulation endpoint)
    pub fn verifier(&self) -> &CallbackVerifier {
        &self.verifier
    }

    /// The billing configuration
    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    // =========================================================================
    // User operations
    // =========================================================================

    /// Start a premium subscription payment
    ///
    /// Rejected when the user already holds premium or still has a live
    /// pending payment link.
    #[instrument(skip(self))]
    pub async fn create_payment(
        &self,
        user_id: UserId,
        payment_method: &str,
    ) -> Result<PaymentCreated, BillingError> {
        let now = self.clock.now();
        let user = self.fetch_user(user_id).await?;

        if user.user_role().is_premium() {
            return Err(BillingError::AlreadySubscribed);
        }
        if self
            .subscriptions
            .find_live_pending_by_user(user_id.0, now)
            .await?
            .is_some()
        {
            return Err(BillingError::PendingPaymentExists);
        }

        let order_id = subscription_order_id(user_id, now.timestamp_millis());
        let amount = self.config.premium_price;

        let handle = self
            .provider
            .create_transaction(CreateTransaction {
                order_id: order_id.clone(),
                amount,
                payment_method: payment_method.to_string(),
                customer_name: user.display_name.clone().unwrap_or_else(|| user.email.clone()),
                email: user.email.clone(),
                expiry_minutes: self.config.payment_expiry_minutes,
            })
            .await?;

        let expires_at = now + Duration::minutes(self.config.payment_expiry_minutes);
        let row = self
            .subscriptions
            .create(CreateSubscription {
                id: Uuid::new_v4(),
                order_id,
                user_id: user_id.0,
                amount,
                payment_method: Some(payment_method.to_string()),
                payment_code: None,
                reference: Some(handle.reference.clone()),
                payment_url: handle.payment_url.clone(),
                va_number: handle.va_number.clone(),
                qr_string: handle.qr_string.clone(),
                expires_at: Some(expires_at),
                auto_renewal_enabled: false,
                renewal_of: None,
            })
            .await?;

        info!(order_id = %row.order_id, user_id = %user_id, "Payment created");

        Ok(PaymentCreated {
            order_id: row.order_id,
            reference: handle.reference,
            amount,
            payment_url: handle.payment_url,
            va_number: handle.va_number,
            qr_string: handle.qr_string,
            expires_at,
        })
    }

    /// Apply a verified gateway callback
    ///
    /// Signature verification happens before any lookup; a bad signature
    /// changes nothing. Redelivered callbacks for already-settled records are
    /// acknowledged without effect.
    #[instrument(skip(self, payload), fields(order_id = %payload.merchant_order_id))]
    pub async fn process_callback(&self, payload: &CallbackPayload) -> Result<(), BillingError> {
        let gateway_status = self.verifier.verify(payload)?;

        let mut row = self
            .subscriptions
            .find_by_order_id(&payload.merchant_order_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        if row.subscription_status() != SubscriptionStatus::Pending {
            debug!(status = %row.status, "Callback for settled record ignored");
            return Ok(());
        }

        if let Some(reference) = &payload.reference {
            row.reference = Some(reference.clone());
        }
        if let Some(code) = &payload.payment_code {
            row.payment_method = Some(code.clone());
        }

        match gateway_status {
            GatewayStatus::Paid => self.activate(&mut row).await?,
            GatewayStatus::Failed => {
                row.set_status(SubscriptionStatus::Failed);
                self.subscriptions.update(&row).await?;
                info!(order_id = %row.order_id, "Payment failed");
            }
            GatewayStatus::Pending => {
                self.subscriptions.update(&row).await?;
            }
        }

        Ok(())
    }

    /// Pull the gateway's view of a pending payment and apply it
    ///
    /// Applies the same transitions as the callback, so a missed webhook can
    /// be recovered by polling.
    #[instrument(skip(self))]
    pub async fn check_status(
        &self,
        user_id: UserId,
        order_id: &str,
    ) -> Result<SubscriptionRow, BillingError> {
        let mut row = self.fetch_owned(user_id, order_id).await?;

        if row.subscription_status() == SubscriptionStatus::Pending {
            match self.provider.check_status(order_id).await? {
                GatewayStatus::Paid => self.activate(&mut row).await?,
                GatewayStatus::Failed => {
                    row.set_status(SubscriptionStatus::Failed);
                    self.subscriptions.update(&row).await?;
                }
                GatewayStatus::Pending => {
                    if row.expires_at.is_some_and(|e| e <= self.clock.now()) {
                        row.set_status(SubscriptionStatus::Expired);
                        self.subscriptions.update(&row).await?;
                    }
                }
            }
        }

        Ok(row)
    }

    /// Cancel the active subscription, optionally requesting a refund
    ///
    /// Without a refund the user keeps access until the end date and only
    /// auto-renewal stops. With a refund (allowed within the refund window)
    /// access is revoked immediately. A failed gateway refund leaves the
    /// record untouched so the request can be retried.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        user_id: UserId,
        reason: Option<String>,
        want_refund: bool,
    ) -> Result<SubscriptionRow, BillingError> {
        let now = self.clock.now();
        let user = self.fetch_user(user_id).await?;

        let Some(mut row) = self.subscriptions.find_active_by_user(user_id.0, now).await? else {
            // Distinguish conflicts from a plain miss
            if let Some(current) = self.subscriptions.find_current_by_user(user_id.0, now).await? {
                return Err(match current.subscription_status() {
                    SubscriptionStatus::Cancelled => BillingError::AlreadyCancelled,
                    _ => BillingError::NoActiveSubscription,
                });
            }
            // Later unpaid attempts must not mask an earlier refund, so the
            // check looks at the most recent record that was actually paid.
            if let Some(last_paid) = self.subscriptions.find_latest_paid_by_user(user_id.0).await? {
                if last_paid.subscription_status() == SubscriptionStatus::Refunded {
                    return Err(BillingError::AlreadyRefunded);
                }
            }
            return Err(BillingError::NoActiveSubscription);
        };

        if !want_refund {
            row.set_status(SubscriptionStatus::Cancelled);
            row.auto_renewal_enabled = false;
            row.cancelled_at = Some(now);
            row.cancelled_by = Some("user".to_string());
            row.cancellation_reason = reason;
            self.subscriptions.update(&row).await?;
            info!(order_id = %row.order_id, "Subscription cancelled, access retained until end date");
            return Ok(row);
        }

        let paid_at = row
            .paid_at
            .ok_or_else(|| BillingError::Internal("active record without paid_at".to_string()))?;
        if !can_refund(paid_at, now, self.config.refund_window_days) {
            return Err(BillingError::RefundWindowExpired);
        }
        let reference = row.reference.clone().ok_or_else(|| {
            BillingError::Internal("active record without gateway reference".to_string())
        })?;

        let reason_text = reason.clone().unwrap_or_else(|| "user request".to_string());
        // Gateway call first: if it fails nothing has been persisted and the
        // whole cancellation is retryable.
        let receipt = self
            .provider
            .request_refund(&reference, row.amount, &reason_text)
            .await?;

        row.set_status(SubscriptionStatus::Refunded);
        row.auto_renewal_enabled = false;
        row.cancelled_at = Some(now);
        row.cancelled_by = Some("user".to_string());
        row.cancellation_reason = reason;
        row.refund_reference = Some(receipt.reference);
        row.refunded_at = Some(now);
        row.refund_amount = Some(row.amount);
        row.refund_status = Some("approved".to_string());
        self.subscriptions.update(&row).await?;

        if user.user_role().is_premium() {
            self.users
                .update_role(user.id, &user.user_role().downgraded().to_string())
                .await?;
        }
        self.notify_quietly(&user, NotificationEvent::RefundIssued { amount: row.amount })
            .await;

        info!(order_id = %row.order_id, "Subscription refunded");
        Ok(row)
    }

    /// Enable or disable auto-renewal on the active subscription
    ///
    /// Re-enabling resets the renewal attempt counters and all one-shot
    /// reminder flags, so the reminder sequence runs again for the new cycle.
    #[instrument(skip(self))]
    pub async fn set_auto_renewal(
        &self,
        user_id: UserId,
        enabled: bool,
    ) -> Result<SubscriptionRow, BillingError> {
        let now = self.clock.now();
        let mut row = self
            .subscriptions
            .find_active_by_user(user_id.0, now)
            .await?
            .ok_or(BillingError::NoActiveSubscription)?;

        row.auto_renewal_enabled = enabled;
        if enabled {
            row.renewal_attempted = false;
            row.renewal_attempt_count = 0;
            row.last_renewal_attempt = None;
            row.reminder_7d_sent = false;
            row.reminder_3d_sent = false;
            row.reminder_1d_sent = false;
            row.ending_notice_sent = false;
        }
        self.subscriptions.update(&row).await?;

        Ok(row)
    }

    /// The record currently granting access, if any
    pub async fn current_subscription(
        &self,
        user_id: UserId,
    ) -> Result<Option<SubscriptionRow>, BillingError> {
        let now = self.clock.now();
        Ok(self.subscriptions.find_current_by_user(user_id.0, now).await?)
    }

    /// The user's subscription history, newest first
    pub async fn history(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<SubscriptionRow>, BillingError> {
        Ok(self.subscriptions.list_by_user(user_id.0, limit).await?)
    }

    /// Full record detail by order id, scoped to the owning user
    pub async fn subscription_details(
        &self,
        user_id: UserId,
        order_id: &str,
    ) -> Result<SubscriptionRow, BillingError> {
        self.fetch_owned(user_id, order_id).await
    }

    /// Refund eligibility for the active subscription
    pub async fn refund_eligibility(
        &self,
        user_id: UserId,
    ) -> Result<RefundEligibility, BillingError> {
        let now = self.clock.now();
        let row = self
            .subscriptions
            .find_active_by_user(user_id.0, now)
            .await?
            .ok_or(BillingError::NoActiveSubscription)?;
        let paid_at = row
            .paid_at
            .ok_or_else(|| BillingError::Internal("active record without paid_at".to_string()))?;

        let days = (now - paid_at).num_days();
        let window = self.config.refund_window_days;
        Ok(RefundEligibility {
            eligible: days <= window,
            days_since_payment: days,
            days_remaining: (window - days).max(0),
            refund_amount: row.amount,
        })
    }

    /// Payment methods available for the premium price
    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethod>, BillingError> {
        self.provider.payment_methods(self.config.premium_price).await
    }

    // =========================================================================
    // Sweep operations (invoked by MaintenanceSweep)
    // =========================================================================

    /// Send upcoming-renewal reminders at the 7/3/1-day thresholds
    ///
    /// Each threshold is one-shot per subscription; running the scan twice on
    /// the same day sends nothing new.
    pub async fn send_renewal_reminders(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut sent = 0;

        for mut row in self.subscriptions.find_ending_with_auto_renewal(now, 7).await? {
            let Some(end) = row.subscription_end else { continue };
            // Whole-day arithmetic: an end 6 days 23 hours out reads as 6, so
            // each arm also accepts the rounded-down value of its threshold.
            let days_left = (end - now).num_days();

            let flag = match days_left {
                6 | 7 if !row.reminder_7d_sent => Some(&mut row.reminder_7d_sent),
                2 | 3 if !row.reminder_3d_sent => Some(&mut row.reminder_3d_sent),
                0 | 1 if !row.reminder_1d_sent => Some(&mut row.reminder_1d_sent),
                _ => None,
            };
            let Some(flag) = flag else { continue };
            *flag = true;

            self.subscriptions.update(&row).await?;
            if let Some(user) = self.users.find_by_id(row.user_id).await? {
                self.notify_quietly(
                    &user,
                    NotificationEvent::RenewalReminder {
                        days_left,
                        ends_at: end,
                    },
                )
                .await;
            }
            sent += 1;
        }

        Ok(sent)
    }

    /// Notify users whose non-renewing subscription ends within 3 days
    pub async fn send_ending_notices(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut sent = 0;

        for mut row in self
            .subscriptions
            .find_ending_without_auto_renewal(now, 3)
            .await?
        {
            let Some(end) = row.subscription_end else { continue };
            row.ending_notice_sent = true;
            self.subscriptions.update(&row).await?;

            if let Some(user) = self.users.find_by_id(row.user_id).await? {
                self.notify_quietly(&user, NotificationEvent::SubscriptionEnding { ends_at: end })
                    .await;
            }
            sent += 1;
        }

        Ok(sent)
    }

    /// Create renewal payments for subscriptions within a day of their end
    ///
    /// Idempotent on the source order id: a live pending renewal record
    /// suppresses a second creation, so a crash between creating the renewal
    /// and marking the source cannot double-create on the next run. A renewal
    /// that settled unpaid (failed, or its link expired) counts as a failed
    /// attempt; after `max_renewal_attempts` the source enters the grace
    /// period, so a renewal that is never paid cannot mint payment links
    /// indefinitely.
    pub async fn process_renewals(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut created = 0;

        for mut row in self.subscriptions.find_renewal_due(now).await? {
            let Some(user) = self.users.find_by_id(row.user_id).await? else {
                warn!(order_id = %row.order_id, "Renewal due for missing user");
                continue;
            };

            if let Some(mut renewal) =
                self.subscriptions.find_latest_renewal_of(&row.order_id).await?
            {
                match renewal.subscription_status() {
                    SubscriptionStatus::Pending
                        if renewal.expires_at.is_none_or(|e| e > now) =>
                    {
                        continue;
                    }
                    SubscriptionStatus::Pending => {
                        // Unpaid link ran out: settle it and count the attempt
                        renewal.set_status(SubscriptionStatus::Expired);
                        self.subscriptions.update(&renewal).await?;
                        if self.record_failed_renewal(&mut row, &user, now).await? {
                            continue;
                        }
                    }
                    SubscriptionStatus::Failed | SubscriptionStatus::Expired => {
                        if self.record_failed_renewal(&mut row, &user, now).await? {
                            continue;
                        }
                    }
                    // A paid renewal settles the source during activation; if
                    // the source still shows up here the next scan drops it.
                    _ => continue,
                }
            }

            let order_id = renewal_order_id(row.user_id(), now.timestamp_millis());
            let method = row.payment_method.clone().unwrap_or_else(|| "VC".to_string());
            let amount = self.config.premium_price;

            let result = self
                .provider
                .create_transaction(CreateTransaction {
                    order_id: order_id.clone(),
                    amount,
                    payment_method: method.clone(),
                    customer_name: user.display_name.clone().unwrap_or_else(|| user.email.clone()),
                    email: user.email.clone(),
                    expiry_minutes: self.config.payment_expiry_minutes,
                })
                .await;

            match result {
                Ok(handle) => {
                    self.subscriptions
                        .create(CreateSubscription {
                            id: Uuid::new_v4(),
                            order_id: order_id.clone(),
                            user_id: row.user_id,
                            amount,
                            payment_method: Some(method),
                            payment_code: None,
                            reference: Some(handle.reference),
                            payment_url: handle.payment_url.clone(),
                            va_number: handle.va_number,
                            qr_string: handle.qr_string,
                            expires_at: Some(
                                now + Duration::minutes(self.config.payment_expiry_minutes),
                            ),
                            auto_renewal_enabled: true,
                            renewal_of: Some(row.order_id.clone()),
                        })
                        .await?;

                    row.renewal_attempted = true;
                    row.last_renewal_attempt = Some(now);
                    self.subscriptions.update(&row).await?;

                    self.notify_quietly(
                        &user,
                        NotificationEvent::RenewalPaymentCreated {
                            order_id,
                            payment_url: handle.payment_url,
                        },
                    )
                    .await;
                    created += 1;
                }
                Err(e) => {
                    warn!(order_id = %row.order_id, error = %e, "Renewal payment creation failed");
                    self.record_failed_renewal(&mut row, &user, now).await?;
                }
            }
        }

        Ok(created)
    }

    /// Expire grace-period records whose window has closed and downgrade the
    /// owner unless another record still grants access
    pub async fn expire_grace_periods(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut expired = 0;

        for mut row in self.subscriptions.find_grace_expired(now).await? {
            row.set_status(SubscriptionStatus::Expired);
            self.subscriptions.update(&row).await?;
            expired += 1;

            let Some(user) = self.users.find_by_id(row.user_id).await? else { continue };
            if user.user_role().is_premium()
                && !self.subscriptions.has_live_subscription(row.user_id, now).await?
            {
                self.users
                    .update_role(user.id, &user.user_role().downgraded().to_string())
                    .await?;
                self.notify_quietly(&user, NotificationEvent::SubscriptionExpired).await;
                info!(order_id = %row.order_id, user_id = %user.id, "Grace period over, premium revoked");
            }
        }

        Ok(expired)
    }

    /// Expire stale pending payment links and cancelled records past their end
    pub async fn expire_stale_records(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut expired = 0;

        for mut row in self.subscriptions.find_stale_pending(now).await? {
            row.set_status(SubscriptionStatus::Expired);
            self.subscriptions.update(&row).await?;
            expired += 1;
        }
        for mut row in self.subscriptions.find_cancelled_past_end(now).await? {
            row.set_status(SubscriptionStatus::Expired);
            self.subscriptions.update(&row).await?;
            expired += 1;
        }

        Ok(expired)
    }

    /// Downgrade premium users with no record granting access
    pub async fn downgrade_lapsed_users(&self) -> Result<u64, BillingError> {
        let now = self.clock.now();
        let mut downgraded = 0;

        for user in self.users.list_premium().await? {
            if self.subscriptions.has_live_subscription(user.id, now).await? {
                continue;
            }
            self.users
                .update_role(user.id, &user.user_role().downgraded().to_string())
                .await?;
            self.notify_quietly(&user, NotificationEvent::SubscriptionExpired).await;
            downgraded += 1;
        }

        Ok(downgraded)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Count one failed renewal attempt against the source record
    ///
    /// Returns `true` when the attempt limit was reached and the source
    /// entered the grace period.
    async fn record_failed_renewal(
        &self,
        row: &mut SubscriptionRow,
        user: &UserRow,
        now: DateTime<Utc>,
    ) -> Result<bool, BillingError> {
        row.renewal_attempt_count += 1;
        row.last_renewal_attempt = Some(now);

        if row.renewal_attempt_count >= self.config.max_renewal_attempts {
            let until = now + Duration::days(self.config.grace_days);
            row.set_status(SubscriptionStatus::GracePeriod);
            row.grace_period_start = Some(now);
            row.grace_period_end = Some(until);
            self.subscriptions.update(row).await?;

            self.notify_quietly(user, NotificationEvent::GracePeriodStarted { until })
                .await;
            info!(order_id = %row.order_id, "Entered grace period after repeated renewal failures");
            return Ok(true);
        }

        self.subscriptions.update(row).await?;
        Ok(false)
    }

    /// Apply the paid transition: record fields, premium role, notification
    async fn activate(&self, row: &mut SubscriptionRow) -> Result<(), BillingError> {
        let now = self.clock.now();
        row.set_status(SubscriptionStatus::Success);
        row.paid_at = Some(now);
        row.subscription_start = Some(now);
        row.subscription_end = Some(now + Duration::days(self.config.period_days));
        self.subscriptions.update(row).await?;

        // A paid renewal supersedes its source: settle the source so it can
        // neither grant access on its own nor be renewed a second time.
        if let Some(source_order) = row.renewal_of.clone() {
            if let Some(mut source) = self.subscriptions.find_by_order_id(&source_order).await? {
                if !source.subscription_status().is_terminal() {
                    source.set_status(SubscriptionStatus::Expired);
                    source.auto_renewal_enabled = false;
                    self.subscriptions.update(&source).await?;
                    debug!(order_id = %source.order_id, renewal = %row.order_id, "Source settled by paid renewal");
                }
            }
        }

        if let Some(user) = self.users.find_by_id(row.user_id).await? {
            if !user.user_role().is_premium() {
                self.users
                    .update_role(user.id, &UserRole::VerifiedPremium.to_string())
                    .await?;
            }
            self.notify_quietly(
                &user,
                NotificationEvent::PaymentConfirmed {
                    order_id: row.order_id.clone(),
                    // set two lines above
                    ends_at: row.subscription_end.unwrap_or(now),
                },
            )
            .await;
        }

        info!(order_id = %row.order_id, "Subscription activated");
        Ok(())
    }

    async fn fetch_user(&self, user_id: UserId) -> Result<UserRow, BillingError> {
        self.users
            .find_by_id(user_id.0)
            .await?
            .ok_or(BillingError::UserNotFound)
    }

    async fn fetch_owned(
        &self,
        user_id: UserId,
        order_id: &str,
    ) -> Result<SubscriptionRow, BillingError> {
        let row = self
            .subscriptions
            .find_by_order_id(order_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;
        // Order ids are guessable; never leak another user's record
        if row.user_id != user_id.0 {
            return Err(BillingError::SubscriptionNotFound);
        }
        Ok(row)
    }

    /// Notification failures are logged, never propagated
    async fn notify_quietly(&self, user: &UserRow, event: NotificationEvent) {
        if let Err(e) = self.notifier.notify(user, event).await {
            warn!(user_id = %user.id, error = %e, "Notification delivery failed");
        }
    }
}
