//! Application state for the Billing API service.

use std::sync::Arc;

use lensa_billing_core::SubscriptionService;
use lensa_db::{DbPool, UserRepository};

use crate::config::Config;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Subscription lifecycle service
    pub subscriptions: Arc<SubscriptionService>,
    /// User repository (token auth lookups)
    pub users: Arc<dyn UserRepository>,
    /// Database pool (readiness probe)
    pub pool: DbPool,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        subscriptions: Arc<SubscriptionService>,
        users: Arc<dyn UserRepository>,
        pool: DbPool,
        config: Config,
    ) -> Self {
        Self {
            subscriptions,
            users,
            pool,
            config: Arc::new(config),
        }
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
