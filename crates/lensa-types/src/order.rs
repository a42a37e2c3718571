//! Merchant order identifiers
//!
//! Order ids are the merchant-side key for one payment attempt:
//! `SUB-<user>-<timestamp>` for first payments, `SUB-RENEW-<user>-<timestamp>`
//! for renewals created by the maintenance sweep.

use crate::UserId;

const SUB_PREFIX: &str = "SUB-";
const RENEW_PREFIX: &str = "SUB-RENEW-";

/// Build the order id for a first subscription payment
pub fn subscription_order_id(user_id: UserId, timestamp_millis: i64) -> String {
    format!("{SUB_PREFIX}{}-{timestamp_millis}", user_id.0.simple())
}

/// Build the order id for an automatic renewal payment
pub fn renewal_order_id(user_id: UserId, timestamp_millis: i64) -> String {
    format!("{RENEW_PREFIX}{}-{timestamp_millis}", user_id.0.simple())
}

/// Whether an order id was generated for a renewal attempt
pub fn is_renewal_order(order_id: &str) -> bool {
    order_id.starts_with(RENEW_PREFIX)
}

/// Whether a string looks like one of our order ids
pub fn is_subscription_order(order_id: &str) -> bool {
    order_id.starts_with(SUB_PREFIX)
}
