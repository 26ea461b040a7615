//! sqlx_pool.rs

use std::time::Duration;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use crate::error::BackfillError;

/// connect a pool; each backfill task checks connections out of it for the length of one statement
/// or one page transaction
pub async fn create_sqlx_pg_pool(database_url: &str, max_connections: u32) -> Result<PgPool, BackfillError> {
    tracing::debug!("[create_sqlx_pg_pool] max_connections: {}", max_connections);
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await
        .map_err(|e| BackfillError::Connection(format!("postgres: {}", e)))
}
