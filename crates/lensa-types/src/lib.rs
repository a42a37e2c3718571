//! Lensa Types - Shared domain types
//!
//! This crate contains domain types used across Lensa services:
//! - User identity and roles
//! - Subscription status and order identifiers

pub mod order;
pub mod subscription;
pub mod user;

pub use order::*;
pub use subscription::*;
pub use user::*;
