//! In-memory doubles for repositories, the payment gateway, the notifier,
//! and the clock

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use lensa_billing_core::{
    BillingError, Clock, CreateTransaction, GatewayStatus, NotificationEvent, Notifier,
    PaymentMethod, PaymentProvider, RefundReceipt, TransactionHandle,
};
use lensa_db::{
    CreateSubscription, DbResult, SubscriptionRepository, SubscriptionRow, UserRepository, UserRow,
};
use lensa_types::SubscriptionStatus;

/// Manually advanced clock
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory user repository for testing
#[derive(Default)]
pub struct MockUserRepository {
    users: DashMap<Uuid, UserRow>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: UserRow) {
        self.users.insert(user.id, user);
    }

    /// Create a test user with the given role
    pub fn test_user(role: &str) -> UserRow {
        let id = Uuid::new_v4();
        UserRow {
            id,
            email: format!("test-{id}@example.com"),
            display_name: Some("Test User".to_string()),
            role: role.to_string(),
            banned: false,
            token_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn role_of(&self, id: Uuid) -> String {
        self.users.get(&id).map(|u| u.role.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: Uuid) -> DbResult<Option<UserRow>> {
        Ok(self.users.get(&id).map(|r| r.value().clone()))
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> DbResult<Option<UserRow>> {
        Ok(self
            .users
            .iter()
            .find(|r| r.token_hash.as_deref() == Some(token_hash))
            .map(|r| r.value().clone()))
    }

    async fn update_role(&self, id: Uuid, role: &str) -> DbResult<()> {
        if let Some(mut user) = self.users.get_mut(&id) {
            user.role = role.to_string();
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_premium(&self) -> DbResult<Vec<UserRow>> {
        Ok(self
            .users
            .iter()
            .filter(|r| r.role == "verified_premium")
            .map(|r| r.value().clone())
            .collect())
    }
}

/// In-memory subscription repository mirroring the Postgres queries
#[derive(Default)]
pub struct MockSubscriptionRepository {
    subs: DashMap<Uuid, SubscriptionRow>,
}

impl MockSubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: SubscriptionRow) {
        self.subs.insert(row.id, row);
    }

    pub fn get(&self, order_id: &str) -> Option<SubscriptionRow> {
        self.subs
            .iter()
            .find(|r| r.order_id == order_id)
            .map(|r| r.value().clone())
    }

    fn all(&self) -> Vec<SubscriptionRow> {
        self.subs.iter().map(|r| r.value().clone()).collect()
    }

    fn is_live(row: &SubscriptionRow, now: DateTime<Utc>) -> bool {
        match row.subscription_status() {
            // The auto-renew arm is bounded by the grace window, like the
            // Postgres query
            SubscriptionStatus::Success => {
                row.subscription_end.is_some_and(|e| e > now)
                    || (row.auto_renewal_enabled
                        && row
                            .subscription_end
                            .is_some_and(|e| e > now - Duration::days(3)))
            }
            SubscriptionStatus::Cancelled => row.subscription_end.is_some_and(|e| e > now),
            SubscriptionStatus::GracePeriod => row.grace_period_end.is_some_and(|e| e > now),
            _ => false,
        }
    }
}

#[async_trait]
impl SubscriptionRepository for MockSubscriptionRepository {
    async fn find_by_order_id(&self, order_id: &str) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.get(order_id))
    }

    async fn find_live_pending_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        Ok(self.all().into_iter().find(|r| {
            r.user_id == user_id
                && r.subscription_status() == SubscriptionStatus::Pending
                && r.expires_at.is_some_and(|e| e > now)
        }))
    }

    async fn find_active_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.subscription_status() == SubscriptionStatus::Success
                    && r.subscription_end.is_some_and(|e| e > now)
            })
            .collect();
        rows.sort_by_key(|r| r.subscription_end);
        Ok(rows.pop())
    }

    async fn find_current_by_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> DbResult<Option<SubscriptionRow>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.user_id == user_id && Self::is_live(r, now))
            .collect();
        rows.sort_by_key(|r| r.subscription_end);
        Ok(rows.pop())
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> DbResult<Vec<SubscriptionRow>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn create(&self, sub: CreateSubscription) -> DbResult<SubscriptionRow> {
        let now = Utc::now();
        let row = SubscriptionRow {
            id: sub.id,
            order_id: sub.order_id,
            user_id: sub.user_id,
            status: "pending".to_string(),
            amount: sub.amount,
            payment_method: sub.payment_method,
            payment_code: sub.payment_code,
            reference: sub.reference,
            payment_url: sub.payment_url,
            va_number: sub.va_number,
            qr_string: sub.qr_string,
            expires_at: sub.expires_at,
            paid_at: None,
            subscription_start: None,
            subscription_end: None,
            auto_renewal_enabled: sub.auto_renewal_enabled,
            renewal_attempted: false,
            renewal_attempt_count: 0,
            last_renewal_attempt: None,
            renewal_of: sub.renewal_of,
            grace_period_start: None,
            grace_period_end: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            refund_reference: None,
            refunded_at: None,
            refund_amount: None,
            refund_status: None,
            reminder_7d_sent: false,
            reminder_3d_sent: false,
            reminder_1d_sent: false,
            ending_notice_sent: false,
            created_at: now,
            updated_at: now,
        };
        self.subs.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update(&self, sub: &SubscriptionRow) -> DbResult<()> {
        let mut row = sub.clone();
        row.updated_at = Utc::now();
        self.subs.insert(row.id, row);
        Ok(())
    }

    async fn find_latest_renewal_of(
        &self,
        source_order_id: &str,
    ) -> DbResult<Option<SubscriptionRow>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.renewal_of.as_deref() == Some(source_order_id))
            .collect();
        rows.sort_by_key(|r| r.created_at);
        Ok(rows.pop())
    }

    async fn find_latest_paid_by_user(
        &self,
        user_id: Uuid,
    ) -> DbResult<Option<SubscriptionRow>> {
        let mut rows: Vec<_> = self
            .all()
            .into_iter()
            .filter(|r| r.user_id == user_id && r.paid_at.is_some())
            .collect();
        rows.sort_by_key(|r| r.paid_at);
        Ok(rows.pop())
    }

    async fn find_ending_with_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(horizon_days);
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::Success
                    && r.auto_renewal_enabled
                    && r.subscription_end.is_some_and(|e| e > now && e <= horizon)
            })
            .collect())
    }

    async fn find_renewal_due(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(1);
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::Success
                    && r.auto_renewal_enabled
                    && r.subscription_end.is_some_and(|e| e <= horizon)
            })
            .collect())
    }

    async fn find_ending_without_auto_renewal(
        &self,
        now: DateTime<Utc>,
        horizon_days: i64,
    ) -> DbResult<Vec<SubscriptionRow>> {
        let horizon = now + Duration::days(horizon_days);
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::Success
                    && !r.auto_renewal_enabled
                    && !r.ending_notice_sent
                    && r.subscription_end.is_some_and(|e| e > now && e <= horizon)
            })
            .collect())
    }

    async fn find_grace_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::GracePeriod
                    && r.grace_period_end.is_some_and(|e| e <= now)
            })
            .collect())
    }

    async fn find_stale_pending(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::Pending
                    && r.expires_at.is_some_and(|e| e <= now)
            })
            .collect())
    }

    async fn find_cancelled_past_end(&self, now: DateTime<Utc>) -> DbResult<Vec<SubscriptionRow>> {
        Ok(self
            .all()
            .into_iter()
            .filter(|r| {
                r.subscription_status() == SubscriptionStatus::Cancelled
                    && r.subscription_end.is_some_and(|e| e <= now)
            })
            .collect())
    }

    async fn has_live_subscription(&self, user_id: Uuid, now: DateTime<Utc>) -> DbResult<bool> {
        Ok(self
            .all()
            .iter()
            .any(|r| r.user_id == user_id && Self::is_live(r, now)))
    }
}

/// Build a paid subscription row for seeding tests
#[allow(dead_code)]
pub fn paid_subscription(
    user_id: Uuid,
    order_id: &str,
    paid_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    auto_renewal: bool,
) -> SubscriptionRow {
    SubscriptionRow {
        id: Uuid::new_v4(),
        order_id: order_id.to_string(),
        user_id,
        status: "success".to_string(),
        amount: 45_000,
        payment_method: Some("VC".to_string()),
        payment_code: None,
        reference: Some(format!("DREF-{order_id}")),
        payment_url: None,
        va_number: None,
        qr_string: None,
        expires_at: None,
        paid_at: Some(paid_at),
        subscription_start: Some(paid_at),
        subscription_end: Some(ends_at),
        auto_renewal_enabled: auto_renewal,
        renewal_attempted: false,
        renewal_attempt_count: 0,
        last_renewal_attempt: None,
        renewal_of: None,
        grace_period_start: None,
        grace_period_end: None,
        cancelled_at: None,
        cancelled_by: None,
        cancellation_reason: None,
        refund_reference: None,
        refunded_at: None,
        refund_amount: None,
        refund_status: None,
        reminder_7d_sent: false,
        reminder_3d_sent: false,
        reminder_1d_sent: false,
        ending_notice_sent: false,
        created_at: paid_at,
        updated_at: paid_at,
    }
}

/// Scripted payment gateway
///
/// `create_transaction` pops scripted failures first, then succeeds with a
/// fresh reference. `check_status` returns whatever was scripted for the
/// order id (pending by default).
pub struct MockProvider {
    create_failures: Mutex<VecDeque<String>>,
    statuses: DashMap<String, GatewayStatus>,
    refund_fails: Mutex<bool>,
    pub created: Mutex<Vec<CreateTransaction>>,
    pub refunds: Mutex<Vec<(String, i64)>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            create_failures: Mutex::new(VecDeque::new()),
            statuses: DashMap::new(),
            refund_fails: Mutex::new(false),
            created: Mutex::new(Vec::new()),
            refunds: Mutex::new(Vec::new()),
        }
    }

    /// Queue N failures for upcoming create_transaction calls
    pub fn fail_next_creates(&self, n: usize) {
        let mut q = self.create_failures.lock().unwrap();
        for _ in 0..n {
            q.push_back("gateway unavailable".to_string());
        }
    }

    pub fn set_status(&self, order_id: &str, status: GatewayStatus) {
        self.statuses.insert(order_id.to_string(), status);
    }

    pub fn fail_refunds(&self, fail: bool) {
        *self.refund_fails.lock().unwrap() = fail;
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    async fn create_transaction(
        &self,
        req: CreateTransaction,
    ) -> Result<TransactionHandle, BillingError> {
        if let Some(err) = self.create_failures.lock().unwrap().pop_front() {
            return Err(BillingError::Provider(err));
        }
        let reference = format!("DREF-{}", Uuid::new_v4().simple());
        self.created.lock().unwrap().push(req);
        Ok(TransactionHandle {
            reference,
            payment_url: Some("https://sandbox.duitku.com/pay/abc".to_string()),
            va_number: None,
            qr_string: None,
        })
    }

    async fn payment_methods(&self, _amount: i64) -> Result<Vec<PaymentMethod>, BillingError> {
        Ok(vec![
            PaymentMethod {
                code: "VC".to_string(),
                name: "Credit Card".to_string(),
                fee: 0,
            },
            PaymentMethod {
                code: "BT".to_string(),
                name: "Permata Bank Transfer".to_string(),
                fee: 4_000,
            },
        ])
    }

    async fn check_status(&self, order_id: &str) -> Result<GatewayStatus, BillingError> {
        Ok(self
            .statuses
            .get(order_id)
            .map(|s| *s.value())
            .unwrap_or(GatewayStatus::Pending))
    }

    async fn request_refund(
        &self,
        reference: &str,
        amount: i64,
        _reason: &str,
    ) -> Result<RefundReceipt, BillingError> {
        if *self.refund_fails.lock().unwrap() {
            return Err(BillingError::Provider("refund rejected".to_string()));
        }
        self.refunds
            .lock()
            .unwrap()
            .push((reference.to_string(), amount));
        Ok(RefundReceipt {
            reference: format!("RF-{reference}"),
        })
    }
}

/// Notifier that records every delivered event
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<(Uuid, NotificationEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events_for(&self, user_id: Uuid) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == user_id)
            .map(|(_, e)| e.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, user: &UserRow, event: NotificationEvent) -> Result<(), BillingError> {
        self.events.lock().unwrap().push((user.id, event));
        Ok(())
    }
}
