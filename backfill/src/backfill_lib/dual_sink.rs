//! dual_sink.rs
//!
//! Writes one page to both stores, always in this order:
//!
//! 1. raw documents to the archive (one batched insert, no dedup)
//! 2. normalize to NormalizedTrade
//! 3. one fact_trades transaction, on conflict do nothing
//!
//! The archive therefore holds every page whose relational write was attempted, and the raw data can
//! be re-normalized later. A page that failed in step 3 keeps its archived flag, so a retry of the
//! same page goes straight to the relational write and doesn't archive it twice.

use std::sync::Arc;
use common_lib::archive::ArchiveStore;
use common_lib::error::BackfillError;
use common_lib::normalized_trade::NormalizedTrade;
use common_lib::trade_record::Page;
use common_lib::trade_store::TradeStore;

/// a fetched page waiting to be written, with how far its write got
#[derive(Debug, Clone)]
pub struct PendingPage {
    page: Page,
    archived: bool,
}

impl PendingPage {
    pub fn new(page: Page) -> PendingPage {
        PendingPage { page, archived: false }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn is_archived(&self) -> bool {
        self.archived
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageWrite {
    /// documents archived by this call; 0 when an earlier attempt already archived the page
    pub archived: u64,
    /// rows new to fact_trades
    pub inserted: u64,
}

#[derive(Clone)]
pub struct DualSinkWriter {
    archive: Arc<dyn ArchiveStore>,
    store: Arc<dyn TradeStore>,
}

impl DualSinkWriter {
    pub fn new(archive: Arc<dyn ArchiveStore>, store: Arc<dyn TradeStore>) -> DualSinkWriter {
        DualSinkWriter { archive, store }
    }

    pub async fn write(&self, symbol: &str, pair_id: i32, pending: &mut PendingPage) -> Result<PageWrite, BackfillError> {
        let mut result = PageWrite::default();

        if !pending.archived {
            result.archived = self.archive.insert_raw(symbol, &pending.page.raw).await?;
            pending.archived = true;
        } else {
            tracing::debug!("[write] {} page of {} already archived; relational write only", symbol, pending.page.len());
        }

        let trades = NormalizedTrade::from_records(&pending.page.records, pair_id)?;
        result.inserted = self.store.insert_page(&trades).await?;

        Ok(result)
    }
}
