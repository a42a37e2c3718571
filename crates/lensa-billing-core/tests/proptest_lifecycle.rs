//! Property-based tests for lifecycle timing rules
//!
//! These tests verify the pure timing predicates:
//! - The refund window closes monotonically (once closed, it never reopens)
//! - The window boundary sits at exactly `window_days` whole days
//! - Subscription period arithmetic holds for any activation instant

mod common;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use lensa_billing_core::can_refund;

// ============================================================================
// Strategies
// ============================================================================

/// Generate a plausible payment instant (seconds precision, 2024-2027 range)
fn arb_paid_at() -> impl Strategy<Value = chrono::DateTime<Utc>> {
    (1_704_067_200i64..1_798_761_600i64)
        .prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

// ============================================================================
// Refund Window Properties
// ============================================================================

proptest! {
    /// Property: eligibility never comes back once it lapses
    #[test]
    fn prop_refund_eligibility_is_monotonic(
        paid_at in arb_paid_at(),
        offset_hours in 0i64..24 * 20,
        step_hours in 1i64..24 * 10,
    ) {
        let earlier = paid_at + Duration::hours(offset_hours);
        let later = earlier + Duration::hours(step_hours);

        if !can_refund(paid_at, earlier, 5) {
            prop_assert!(!can_refund(paid_at, later, 5));
        }
    }

    /// Property: any instant within `window_days` whole days is eligible
    #[test]
    fn prop_refund_open_within_window(
        paid_at in arb_paid_at(),
        elapsed_hours in 0i64..=5 * 24,
    ) {
        let now = paid_at + Duration::hours(elapsed_hours);
        prop_assert!(can_refund(paid_at, now, 5));
    }

    /// Property: past six whole days the window is closed
    #[test]
    fn prop_refund_closed_after_window(
        paid_at in arb_paid_at(),
        extra_hours in 0i64..24 * 30,
    ) {
        let now = paid_at + Duration::days(6) + Duration::hours(extra_hours);
        prop_assert!(!can_refund(paid_at, now, 5));
    }

    /// Property: a zero-day window still allows same-day refunds
    #[test]
    fn prop_zero_window_allows_same_day(
        paid_at in arb_paid_at(),
        elapsed_hours in 0i64..24,
    ) {
        let now = paid_at + Duration::hours(elapsed_hours);
        prop_assert!(can_refund(paid_at, now, 0));
        prop_assert!(!can_refund(paid_at, now + Duration::days(1), 0));
    }
}

// ============================================================================
// Period Arithmetic Properties
// ============================================================================

proptest! {
    /// Property: a 30-day period always ends exactly 30 days after activation,
    /// regardless of the activation instant (DST and month lengths do not
    /// apply to UTC day arithmetic)
    #[test]
    fn prop_period_end_is_thirty_days_out(paid_at in arb_paid_at()) {
        let end = paid_at + Duration::days(30);
        prop_assert_eq!((end - paid_at).num_days(), 30);
        prop_assert_eq!((end - paid_at).num_seconds(), 30 * 86_400);
    }
}

// ============================================================================
// Boundary Cases (Non-Property Tests)
// ============================================================================

#[test]
fn test_refund_boundary_is_inclusive() {
    let paid_at = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    // Exactly five whole days later: still eligible
    assert!(can_refund(paid_at, paid_at + Duration::days(5), 5));
    // Just under six whole days: `num_days` floors, still eligible
    assert!(can_refund(
        paid_at,
        paid_at + Duration::days(5) + Duration::hours(23),
        5
    ));
    // Six whole days: closed
    assert!(!can_refund(paid_at, paid_at + Duration::days(6), 5));
}
