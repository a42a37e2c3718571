//! Subscription status

use serde::{Deserialize, Serialize};

/// Subscription record status
///
/// One record exists per payment attempt; records are never deleted, so
/// terminal states (`Expired`, `Refunded`) remain visible as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Payment link issued, waiting for the gateway
    Pending,
    /// Paid; premium access runs until the subscription end date
    Success,
    /// Gateway reported the payment as failed
    Failed,
    /// Payment link or subscription period lapsed
    Expired,
    /// Cancelled by the user; access retained until the end date
    Cancelled,
    /// Cancelled with a granted refund; access revoked immediately
    Refunded,
    /// Renewal kept failing; short retention window before expiry
    GracePeriod,
}

impl SubscriptionStatus {
    /// Terminal states admit no further transitions
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Expired | Self::Refunded)
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::GracePeriod => "grace_period",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            "grace_period" => Ok(Self::GracePeriod),
            _ => Err(StatusParseError(s.to_string())),
        }
    }
}

/// Error parsing a subscription status string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid subscription status: {0}")]
pub struct StatusParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for status in [
            SubscriptionStatus::Pending,
            SubscriptionStatus::Success,
            SubscriptionStatus::Failed,
            SubscriptionStatus::Expired,
            SubscriptionStatus::Cancelled,
            SubscriptionStatus::Refunded,
            SubscriptionStatus::GracePeriod,
        ] {
            assert_eq!(
                status.to_string().parse::<SubscriptionStatus>().unwrap(),
                status
            );
        }
    }

    #[test]
    fn terminal_states() {
        assert!(SubscriptionStatus::Refunded.is_terminal());
        assert!(SubscriptionStatus::Expired.is_terminal());
        assert!(!SubscriptionStatus::Success.is_terminal());
        assert!(!SubscriptionStatus::GracePeriod.is_terminal());
    }
}
