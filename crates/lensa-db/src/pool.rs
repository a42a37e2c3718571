//! Postgres connection pool

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Database connection pool type alias
pub type DbPool = PgPool;

/// Open a pool sized for the billing workload
///
/// Traffic is short point queries per request plus the daily sweep's scans,
/// so a small pool with a tight acquire timeout is enough; a saturated pool
/// should fail the request rather than queue past the HTTP timeout.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await
}
