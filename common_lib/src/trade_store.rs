//! trade_store.rs
//!
//! fact_trades: the deduplicated, typed projection of the raw archive
//!
//! Expected uniqueness constraint (the DDL is managed outside this repo):
//!
//! ```sql
//! alter table fact_trades add constraint fact_trades_trade_id_trade_time_key unique (trade_id, trade_time);
//! ```
//!

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use crate::error::BackfillError;
use crate::normalized_trade::NormalizedTrade;

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert a page inside one transaction. Rows already present are skipped silently; returns
    /// the number of rows actually inserted. On error nothing from the page is visible.
    async fn insert_page(&self, trades: &[NormalizedTrade]) -> Result<u64, BackfillError>;
}

pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    pub fn new(pool: PgPool) -> PgTradeStore {
        PgTradeStore { pool }
    }

    pub fn insert_query(trades: &[NormalizedTrade]) -> QueryBuilder<'_, Postgres> {
        let mut query_builder = QueryBuilder::new(
            "insert into fact_trades (trade_id, pair_id, price, quantity, trade_time, is_buyer_maker) ",
        );
        query_builder.push_values(trades, |mut b, t| {
            b.push_bind(t.trade_id)
                .push_bind(t.pair_id)
                .push_bind(&t.price)
                .push_bind(&t.quantity)
                .push_bind(t.trade_time)
                .push_bind(t.is_buyer_maker);
        });
        query_builder.push(" on conflict (trade_id, trade_time) do nothing");
        query_builder
    }
}

#[async_trait]
impl TradeStore for PgTradeStore {
    async fn insert_page(&self, trades: &[NormalizedTrade]) -> Result<u64, BackfillError> {
        if trades.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(BackfillError::relational)?;

        let mut query_builder = PgTradeStore::insert_query(trades);
        // an early return drops tx, which rolls the page back
        let result = query_builder
            .build()
            .execute(&mut tx)
            .await
            .map_err(|e| {
                tracing::error!("[PgTradeStore::insert_page] {} trades rolled back: {:?}", trades.len(), &e);
                BackfillError::relational(e)
            })?;

        tx.commit().await.map_err(BackfillError::relational)?;

        tracing::debug!("[PgTradeStore::insert_page] staged: {}, inserted: {}", trades.len(), result.rows_affected());
        Ok(result.rows_affected())
    }
}
