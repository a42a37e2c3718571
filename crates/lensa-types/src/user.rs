//! User types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from a string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Account roles
///
/// `VerifiedPremium` is granted and revoked exclusively by subscription
/// lifecycle transitions (payment success, refund, grace-period expiry,
/// downgrade sweep) - never by admin tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Fresh account
    Basic,
    /// Identity-verified account
    Verified,
    /// Verified account on the free plan
    VerifiedBasic,
    /// Verified account with an active premium subscription
    VerifiedPremium,
    /// Official/partner account
    Official,
    /// Internal developer account
    Developer,
}

impl UserRole {
    /// Whether this role carries premium entitlements
    pub const fn is_premium(&self) -> bool {
        matches!(self, Self::VerifiedPremium)
    }

    /// Role a premium account falls back to when its subscription ends
    pub const fn downgraded(&self) -> Self {
        match self {
            Self::VerifiedPremium => Self::Verified,
            other => *other,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Basic => "basic",
            Self::Verified => "verified",
            Self::VerifiedBasic => "verified_basic",
            Self::VerifiedPremium => "verified_premium",
            Self::Official => "official",
            Self::Developer => "developer",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for UserRole {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "verified" => Ok(Self::Verified),
            "verified_basic" => Ok(Self::VerifiedBasic),
            "verified_premium" => Ok(Self::VerifiedPremium),
            "official" => Ok(Self::Official),
            "developer" => Ok(Self::Developer),
            _ => Err(RoleParseError(s.to_string())),
        }
    }
}

/// Error parsing a role string
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        for role in [
            UserRole::Basic,
            UserRole::Verified,
            UserRole::VerifiedBasic,
            UserRole::VerifiedPremium,
            UserRole::Official,
            UserRole::Developer,
        ] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
    }

    #[test]
    fn downgrade_only_touches_premium() {
        assert_eq!(UserRole::VerifiedPremium.downgraded(), UserRole::Verified);
        assert_eq!(UserRole::Official.downgraded(), UserRole::Official);
        assert_eq!(UserRole::Basic.downgraded(), UserRole::Basic);
    }
}
