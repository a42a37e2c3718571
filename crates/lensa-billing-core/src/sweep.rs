//! Daily maintenance sweep
//!
//! Runs the time-driven parts of the lifecycle: renewal reminders, ending
//! notices, renewal payment creation, grace-period expiry, stale-record
//! cleanup, and role downgrades. The steps run in a fixed order and each step
//! is independent: one failing is logged and the rest still run, and the next
//! tick retries whatever was missed. Every step is idempotent, so running the
//! sweep twice in a row does no extra work.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::error::BillingError;
use crate::service::SubscriptionService;

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub reminders_sent: u64,
    pub ending_notices_sent: u64,
    pub renewals_created: u64,
    pub grace_periods_expired: u64,
    pub stale_records_expired: u64,
    pub users_downgraded: u64,
}

/// The periodic maintenance sweep over subscription records
pub struct MaintenanceSweep {
    service: Arc<SubscriptionService>,
}

impl MaintenanceSweep {
    /// Create a new sweep over the given service
    pub fn new(service: Arc<SubscriptionService>) -> Self {
        Self { service }
    }

    /// Run a single sweep pass
    ///
    /// Steps run in order; a failed step is logged and skipped for this pass.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        report.reminders_sent = step("renewal_reminders", self.service.send_renewal_reminders().await);
        report.ending_notices_sent = step("ending_notices", self.service.send_ending_notices().await);
        report.renewals_created = step("process_renewals", self.service.process_renewals().await);
        report.grace_periods_expired =
            step("expire_grace_periods", self.service.expire_grace_periods().await);
        report.stale_records_expired =
            step("expire_stale_records", self.service.expire_stale_records().await);
        report.users_downgraded =
            step("downgrade_lapsed_users", self.service.downgrade_lapsed_users().await);

        info!(?report, "Maintenance sweep finished");
        report
    }

    /// Spawn the sweep on the given interval
    ///
    /// The first pass runs immediately so a restarted service catches up
    /// without waiting a full interval.
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}

fn step(name: &str, result: Result<u64, BillingError>) -> u64 {
    match result {
        Ok(n) => n,
        Err(e) => {
            error!(step = name, error = %e, "Sweep step failed");
            0
        }
    }
}
