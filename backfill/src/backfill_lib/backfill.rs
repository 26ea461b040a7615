//! backfill.rs
//!
//! Wire the stores and the trade API together and run one controller per configured symbol.
//!
//! Every symbol is its own sequential pipeline in its own tokio task. They share the postgres pools
//! and the http client (all pooled and thread safe) and nothing else.

use std::sync::Arc;
use common_lib::archive::{ArchiveStore, JsonlArchive, PgArchive};
use common_lib::binance_rest::{BinanceAggTrades, TradeSource};
use common_lib::error::BackfillError;
use common_lib::pair::{PairLookup, PgPairLookup};
use common_lib::settings::{ArchiveKind, Settings};
use common_lib::sqlx_pool::create_sqlx_pg_pool;
use common_lib::trade_store::{PgTradeStore, TradeStore};
use crate::data_collector::{BackfillConfig, BackfillController};
use crate::dual_sink::DualSinkWriter;
use crate::progress::RunSummary;
use crate::stop_signal::StopSignal;

pub struct Backfill {}

impl Backfill {
    /// Connect everything, run all symbols to completion and return one result per symbol, in the
    /// order they were configured.
    pub async fn run(settings: &Settings, stop: StopSignal) -> Result<Vec<Result<RunSummary, BackfillError>>, BackfillError> {
        let pool = create_sqlx_pg_pool(&settings.database_url, settings.db_max_connections).await?;
        tracing::debug!("[run] relational pool connected");

        let archive: Arc<dyn ArchiveStore> = match settings.archive_kind {
            ArchiveKind::Postgres if settings.archive_database_url == settings.database_url => {
                Arc::new(PgArchive::new(pool.clone()))
            }
            ArchiveKind::Postgres => {
                let archive_pool = create_sqlx_pg_pool(&settings.archive_database_url, settings.db_max_connections).await?;
                Arc::new(PgArchive::new(archive_pool))
            }
            ArchiveKind::Jsonl => Arc::new(JsonlArchive::open(&settings.archive_jsonl_path).await?),
        };
        tracing::info!("[run] archive: {}", &settings.archive_kind);

        let client = BinanceAggTrades::client(settings.http_timeout)?;
        let source: Arc<dyn TradeSource> = Arc::new(BinanceAggTrades::new(client, &settings.binance_api_url));
        let pairs: Arc<dyn PairLookup> = Arc::new(PgPairLookup::new(pool.clone()));
        let store: Arc<dyn TradeStore> = Arc::new(PgTradeStore::new(pool.clone()));
        let writer = DualSinkWriter::new(archive, store);

        let mut handles = vec![];
        for symbol in &settings.symbols {
            let config = BackfillConfig::from_settings(symbol, settings);
            let mut controller = BackfillController::new(config, pairs.clone(), source.clone(), writer.clone(), stop.clone());
            let handle = tokio::spawn(async move { controller.run().await });
            handles.push((symbol.clone(), handle));
        }

        let mut results = vec![];
        for (symbol, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("[run] {} task failed: {:?}", &symbol, &e);
                    Err(BackfillError::Task(format!("{}: {}", symbol, e)))
                }
            };
            results.push(result);
        }

        pool.close().await;
        Ok(results)
    }
}
