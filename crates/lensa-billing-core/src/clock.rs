//! Injectable time source
//!
//! Every lifecycle decision (payment expiry, refund windows, reminder
//! thresholds, grace periods) compares against the injected clock, never
//! against `Utc::now()` directly, so tests can drive time synchronously.

use chrono::{DateTime, Utc};

/// Time source for the lifecycle engine and maintenance sweep
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
