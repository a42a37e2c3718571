//! Lensa DB - Database abstractions
//!
//! SQLx-based database layer for Lensa services.
//!
//! # Example
//!
//! ```rust,ignore
//! use lensa_db::{create_pool, Repositories};
//!
//! let pool = create_pool("postgres://localhost/lensa").await?;
//! let repos = Repositories::new(pool);
//!
//! let sub = repos.subscriptions.find_by_order_id("SUB-...").await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, DbPool};
pub use repo::*;
