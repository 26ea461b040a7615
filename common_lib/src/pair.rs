//! pair.rs
//!
//! map a trading pair symbol (BTCUSDT) to its dim_pairs id

use async_trait::async_trait;
use sqlx::PgPool;
use crate::error::BackfillError;

#[async_trait]
pub trait PairLookup: Send + Sync {
    /// Err(Configuration) when the symbol isn't provisioned; never retried
    async fn pair_id(&self, symbol: &str) -> Result<i32, BackfillError>;
}

/// read-only lookup against the dim_pairs dimension table
pub struct PgPairLookup {
    pool: PgPool,
}

impl PgPairLookup {
    pub fn new(pool: PgPool) -> PgPairLookup {
        PgPairLookup { pool }
    }
}

#[async_trait]
impl PairLookup for PgPairLookup {
    async fn pair_id(&self, symbol: &str) -> Result<i32, BackfillError> {
        let result = sqlx::query_scalar::<_, i32>("select pair_id from dim_pairs where symbol = $1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(pair_id)) => {
                tracing::debug!("[pair_id] {} -> {}", symbol, pair_id);
                Ok(pair_id)
            }
            Ok(None) => Err(BackfillError::Configuration(format!(
                "pair {} not found in dim_pairs; insert it before running the backfill",
                symbol
            ))),
            Err(e) => {
                tracing::error!("[pair_id] lookup for {} failed: {:?}", symbol, &e);
                Err(BackfillError::Lookup(e.to_string()))
            }
        }
    }
}
