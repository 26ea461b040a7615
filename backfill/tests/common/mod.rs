//! in-memory stand-ins for the trade API, the pair table and both stores
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use backfill_lib::data_collector::{BackfillConfig, BackfillController};
use backfill_lib::dual_sink::DualSinkWriter;
use backfill_lib::retry::RetryPolicy;
use backfill_lib::stop_signal::StopSignal;
use common_lib::archive::ArchiveStore;
use common_lib::binance_rest::TradeSource;
use common_lib::error::BackfillError;
use common_lib::normalized_trade::NormalizedTrade;
use common_lib::pair::PairLookup;
use common_lib::trade_record::{Page, TradeRecord};
use common_lib::trade_store::TradeStore;
use serde_json::Value;

pub const NEWEST_MS: i64 = 1_737_388_800_000;
pub const BTC_PAIR_ID: i32 = 1;

pub struct MemoryPairs {
    pairs: HashMap<String, i32>,
    pub calls: AtomicUsize,
}

impl MemoryPairs {
    pub fn btc() -> MemoryPairs {
        MemoryPairs {
            pairs: HashMap::from([("BTCUSDT".to_string(), BTC_PAIR_ID)]),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PairLookup for MemoryPairs {
    async fn pair_id(&self, symbol: &str) -> Result<i32, BackfillError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pairs
            .get(symbol)
            .copied()
            .ok_or_else(|| BackfillError::Configuration(format!("pair {} not found", symbol)))
    }
}

/// Generates trades one millisecond apart walking back from NEWEST_MS, newest first, at or before the bound.
pub struct SyntheticSource {
    pub calls: AtomicUsize,
    /// bound passed on every call, in order
    pub bounds: Mutex<Vec<Option<i64>>>,
    /// oldest timestamp that exists; below it pages come back empty
    pub horizon_ms: i64,
    /// 1-based call numbers that fail with FetchFailed
    pub fail_calls: Mutex<HashSet<usize>>,
    /// call number from which every page is empty
    pub empty_from_call: Option<usize>,
    pub oldest_first: bool,
    pub ignore_bound: bool,
    /// a price that won't parse on every record
    pub bad_price: bool,
    /// tripped right after this call number returns
    pub stop_after_call: Option<(usize, StopSignal)>,
}

impl SyntheticSource {
    pub fn new() -> SyntheticSource {
        SyntheticSource {
            calls: AtomicUsize::new(0),
            bounds: Mutex::new(vec![]),
            horizon_ms: 0,
            fail_calls: Mutex::new(HashSet::new()),
            empty_from_call: None,
            oldest_first: false,
            ignore_bound: false,
            bad_price: false,
            stop_after_call: None,
        }
    }

    pub fn failing_on(self, calls: &[usize]) -> SyntheticSource {
        *self.fail_calls.lock().unwrap() = calls.iter().copied().collect();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bounds(&self) -> Vec<Option<i64>> {
        self.bounds.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeSource for SyntheticSource {
    async fn fetch_page(&self, _symbol: &str, limit: u16, before_ms: Option<i64>) -> Result<Page, BackfillError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.bounds.lock().unwrap().push(before_ms);

        if let Some((stop_call, stop)) = &self.stop_after_call {
            if call == *stop_call {
                stop.stop();
            }
        }
        if self.fail_calls.lock().unwrap().remove(&call) {
            return Err(BackfillError::Fetch(format!("injected failure on call {}", call)));
        }
        if let Some(n) = self.empty_from_call {
            if call >= n {
                return Ok(Page::default());
            }
        }

        let top = match before_ms {
            Some(bound) if !self.ignore_bound => bound,
            _ => NEWEST_MS,
        };
        let mut records = vec![];
        for i in 0..limit as i64 {
            let timestamp_ms = top - i;
            if timestamp_ms < self.horizon_ms {
                break;
            }
            records.push(TradeRecord {
                trade_id: timestamp_ms - self.horizon_ms,
                price: if self.bad_price { "n/a".to_string() } else { "97000.50".to_string() },
                quantity: "0.01".to_string(),
                timestamp_ms,
                is_buyer_maker: i % 2 == 0,
            });
        }
        if self.oldest_first {
            records.reverse();
        }
        Ok(Page::from_records(records))
    }
}

/// A fixed trade history, any number of trades per millisecond, served the way the trade API does:
/// the newest `limit` trades at or before the bound, newest first.
pub struct ListedSource {
    pub trades: Vec<(i64, i64)>,
    pub bounds: Mutex<Vec<Option<i64>>>,
}

impl ListedSource {
    /// (trade_id, timestamp_ms) pairs in any order
    pub fn new(trades: &[(i64, i64)]) -> ListedSource {
        let mut trades = trades.to_vec();
        trades.sort_by(|a, b| (b.1, b.0).cmp(&(a.1, a.0)));
        ListedSource { trades, bounds: Mutex::new(vec![]) }
    }

    pub fn bounds(&self) -> Vec<Option<i64>> {
        self.bounds.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradeSource for ListedSource {
    async fn fetch_page(&self, _symbol: &str, limit: u16, before_ms: Option<i64>) -> Result<Page, BackfillError> {
        self.bounds.lock().unwrap().push(before_ms);
        let records = self
            .trades
            .iter()
            .filter(|(_, ts)| before_ms.map_or(true, |bound| *ts <= bound))
            .take(limit as usize)
            .map(|&(trade_id, timestamp_ms)| TradeRecord {
                trade_id,
                price: "97000.50".to_string(),
                quantity: "0.01".to_string(),
                timestamp_ms,
                is_buyer_maker: false,
            })
            .collect();
        Ok(Page::from_records(records))
    }
}

pub struct MemoryArchive {
    pub docs: Mutex<Vec<Value>>,
    pub calls: AtomicUsize,
    pub fail_calls: Mutex<HashSet<usize>>,
}

impl MemoryArchive {
    pub fn new() -> MemoryArchive {
        MemoryArchive { docs: Mutex::new(vec![]), calls: AtomicUsize::new(0), fail_calls: Mutex::new(HashSet::new()) }
    }

    pub fn failing_on(self, calls: &[usize]) -> MemoryArchive {
        *self.fail_calls.lock().unwrap() = calls.iter().copied().collect();
        self
    }

    pub fn len(&self) -> usize {
        self.docs.lock().unwrap().len()
    }

    /// how many archived documents carry this aggregate trade id
    pub fn count_trade(&self, trade_id: i64) -> usize {
        self.docs.lock().unwrap().iter().filter(|d| d["a"] == trade_id).count()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn insert_raw(&self, _symbol: &str, docs: &[Value]) -> Result<u64, BackfillError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_calls.lock().unwrap().remove(&call) {
            return Err(BackfillError::archive("injected archive failure"));
        }
        self.docs.lock().unwrap().extend_from_slice(docs);
        Ok(docs.len() as u64)
    }
}

/// keyed on (trade_id, trade_time) like the fact_trades constraint; a failed call stores nothing
pub struct MemoryTradeStore {
    pub rows: Mutex<BTreeMap<(i64, i64), NormalizedTrade>>,
    pub calls: AtomicUsize,
    pub fail_calls: Mutex<HashSet<usize>>,
}

impl MemoryTradeStore {
    pub fn new() -> MemoryTradeStore {
        MemoryTradeStore { rows: Mutex::new(BTreeMap::new()), calls: AtomicUsize::new(0), fail_calls: Mutex::new(HashSet::new()) }
    }

    pub fn failing_on(self, calls: &[usize]) -> MemoryTradeStore {
        *self.fail_calls.lock().unwrap() = calls.iter().copied().collect();
        self
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn trade_ids(&self) -> Vec<i64> {
        self.rows.lock().unwrap().keys().map(|(trade_id, _)| *trade_id).collect()
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn insert_page(&self, trades: &[NormalizedTrade]) -> Result<u64, BackfillError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_calls.lock().unwrap().remove(&call) {
            return Err(BackfillError::relational("injected relational failure"));
        }
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = 0;
        for t in trades {
            let key = (t.trade_id, t.trade_time.timestamp_millis());
            if !rows.contains_key(&key) {
                rows.insert(key, t.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

/// retry immediately, no pacing
pub fn fast_config(target: u64, max_attempts: Option<u32>) -> BackfillConfig {
    BackfillConfig {
        pacing: Duration::ZERO,
        retry: RetryPolicy {
            max_attempts,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 2.0,
            jitter: false,
        },
        ..BackfillConfig::new("BTCUSDT", target)
    }
}

pub struct Harness<S = SyntheticSource> {
    pub pairs: Arc<MemoryPairs>,
    pub source: Arc<S>,
    pub archive: Arc<MemoryArchive>,
    pub store: Arc<MemoryTradeStore>,
    pub stop: StopSignal,
}

impl Harness {
    pub fn new(source: SyntheticSource, archive: MemoryArchive, store: MemoryTradeStore) -> Harness {
        Harness::with_source(Arc::new(source), archive, store)
    }
}

impl<S: TradeSource + 'static> Harness<S> {
    pub fn with_source(source: Arc<S>, archive: MemoryArchive, store: MemoryTradeStore) -> Harness<S> {
        Harness {
            pairs: Arc::new(MemoryPairs::btc()),
            source,
            archive: Arc::new(archive),
            store: Arc::new(store),
            stop: StopSignal::new(),
        }
    }

    pub fn writer(&self) -> DualSinkWriter {
        DualSinkWriter::new(self.archive.clone(), self.store.clone())
    }

    pub fn controller(&self, config: BackfillConfig) -> BackfillController {
        BackfillController::new(config, self.pairs.clone(), self.source.clone(), self.writer(), self.stop.clone())
    }
}
