//! Common test utilities for lensa-billing-core integration tests

pub mod mocks;

#[allow(unused_imports)]
pub use mocks::{
    paid_subscription, MockProvider, MockSubscriptionRepository, MockUserRepository,
    RecordingNotifier, TestClock,
};

use std::sync::Arc;

use lensa_billing_core::{BillingConfig, SubscriptionService};

/// Everything a lifecycle test needs, wired to in-memory doubles
pub struct TestHarness {
    pub service: Arc<SubscriptionService>,
    pub subscriptions: Arc<MockSubscriptionRepository>,
    pub users: Arc<MockUserRepository>,
    pub provider: Arc<MockProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<TestClock>,
    pub config: BillingConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = BillingConfig::new("D1234", "test-api-key");
        let subscriptions = Arc::new(MockSubscriptionRepository::new());
        let users = Arc::new(MockUserRepository::new());
        let provider = Arc::new(MockProvider::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let clock = Arc::new(TestClock::new());

        let service = Arc::new(SubscriptionService::new(
            subscriptions.clone(),
            users.clone(),
            provider.clone(),
            notifier.clone(),
            clock.clone(),
            config.clone(),
        ));

        Self {
            service,
            subscriptions,
            users,
            provider,
            notifier,
            clock,
            config,
        }
    }
}
