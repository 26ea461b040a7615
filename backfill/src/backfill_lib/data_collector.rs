//! data_collector.rs
//!
//! Backfill controller: walks one symbol's trade history backwards, newest to oldest, one page at a
//! time until the target volume is reached or the source runs dry.
//!
//! Per page: fetch at or before the cursor -> empty page ends the run -> dual-sink write -> count
//! it -> cursor = oldest timestamp in the page -> pause -> repeat.
//!
//! The cursor's own millisecond is fetched again on the next call so trades tied on it that didn't
//! fit in the page are still collected; the ones already stored are ignored by the relational
//! insert. A page holding nothing but trades on the cursor means the walk can't move further back:
//! a short one is the end of the history, a full one pauses the run.
//!
//! Failed fetches/writes are retried at the same cursor with backoff. A page is never skipped. When
//! retries run out the run stops in PausedOnError; its summary carries the cursor and count to
//! start the next run from.

use std::sync::Arc;
use std::time::{Duration, Instant};
use common_lib::binance_rest::TradeSource;
use common_lib::error::BackfillError;
use common_lib::pair::PairLookup;
use common_lib::settings::{Settings, MAX_PAGE_SIZE};
use crate::dual_sink::{DualSinkWriter, PendingPage};
use crate::progress::{Progress, RunOutcome, RunSummary};
use crate::retry::RetryPolicy;
use crate::stop_signal::StopSignal;

#[derive(Debug, Clone)]
pub struct BackfillConfig {
    pub symbol: String,
    pub target: u64,
    pub page_size: u16,
    /// courtesy delay between pages
    pub pacing: Duration,
    pub retry: RetryPolicy,
    /// resume: upper bound (inclusive) to start from instead of the most recent trade
    pub start_before_ms: Option<i64>,
    /// resume: count already collected by an earlier run
    pub already_collected: u64,
}

impl BackfillConfig {
    pub fn new(symbol: &str, target: u64) -> BackfillConfig {
        BackfillConfig {
            symbol: symbol.to_uppercase(),
            target,
            page_size: MAX_PAGE_SIZE,
            pacing: Duration::from_millis(100),
            retry: RetryPolicy::default(),
            start_before_ms: None,
            already_collected: 0,
        }
    }

    pub fn from_settings(symbol: &str, settings: &Settings) -> BackfillConfig {
        BackfillConfig {
            page_size: settings.page_size,
            pacing: settings.pacing,
            retry: RetryPolicy::from_settings(settings),
            start_before_ms: settings.start_before_ms,
            already_collected: settings.already_collected,
            ..BackfillConfig::new(symbol, settings.target)
        }
    }
}

/// what to do after a failed fetch or write
enum AfterFailure {
    Retry,
    Stop,
}

pub struct BackfillController {
    config: BackfillConfig,
    pairs: Arc<dyn PairLookup>,
    source: Arc<dyn TradeSource>,
    writer: DualSinkWriter,
    stop: StopSignal,
    pair_id: Option<i32>,
}

impl BackfillController {
    pub fn new(
        config: BackfillConfig,
        pairs: Arc<dyn PairLookup>,
        source: Arc<dyn TradeSource>,
        writer: DualSinkWriter,
        stop: StopSignal,
    ) -> BackfillController {
        BackfillController { config, pairs, source, writer, stop, pair_id: None }
    }

    /// resolved once; later calls use the cached id
    async fn resolve_pair(&mut self) -> Result<i32, BackfillError> {
        if let Some(pair_id) = self.pair_id {
            return Ok(pair_id);
        }
        let pair_id = self.pairs.pair_id(&self.config.symbol).await?;
        self.pair_id = Some(pair_id);
        Ok(pair_id)
    }

    /// Run to a terminal state. Only a configuration/lookup failure comes back as Err, and that
    /// happens before the trade API is called at all.
    pub async fn run(&mut self) -> Result<RunSummary, BackfillError> {
        let symbol = self.config.symbol.clone();
        let pair_id = match self.resolve_pair().await {
            Ok(pair_id) => pair_id,
            Err(e) => {
                tracing::error!("[run] {} aborted before fetching: {}", &symbol, &e);
                return Err(e);
            }
        };

        let mut progress = Progress::new(&symbol, self.config.target, self.config.already_collected);
        let mut cursor: Option<i64> = self.config.start_before_ms;
        let mut failures: u32 = 0;
        let mut last_error: Option<String> = None;
        // a page whose write failed is kept and retried instead of being fetched again
        let mut pending: Option<PendingPage> = None;

        tracing::info!(
            "[run] starting {} (pair_id {}), target {}, page size {}, cursor {:?}, already collected {}",
            &symbol, pair_id, self.config.target, self.config.page_size, &cursor, self.config.already_collected
        );

        let outcome = loop {
            if progress.target_reached() {
                break RunOutcome::TargetReached;
            }
            if self.stop.is_stopped() {
                break RunOutcome::Cancelled;
            }

            let page_started = Instant::now();

            let mut current = match pending.take() {
                Some(p) => p,
                None => match self.source.fetch_page(&symbol, self.config.page_size, cursor).await {
                    Ok(page) => PendingPage::new(page),
                    Err(e) => {
                        last_error = Some(e.to_string());
                        match self.after_failure(&e, &mut failures, cursor).await {
                            AfterFailure::Retry => continue,
                            AfterFailure::Stop => break RunOutcome::PausedOnError,
                        }
                    }
                },
            };

            let Some((oldest, newest)) = current.page().time_range() else {
                tracing::info!("[run] {} no trades at or before cursor {:?}; history exhausted", &symbol, &cursor);
                break RunOutcome::Exhausted;
            };
            if let Some(bound) = cursor {
                if newest > bound {
                    // the source ignored the bound; going on would loop on the same page forever
                    let e = format!("source returned trades at {} newer than cursor {}", newest, bound);
                    tracing::error!("[run] {} {}", &symbol, &e);
                    last_error = Some(e);
                    break RunOutcome::PausedOnError;
                }
            }
            // nothing older than the cursor came back, only trades on it
            let pinned = cursor == Some(oldest);
            let full = current.page().len() >= usize::from(self.config.page_size);

            match self.writer.write(&symbol, pair_id, &mut current).await {
                Ok(written) => {
                    failures = 0;
                    cursor = Some(oldest);
                    progress.record_page(current.page().len(), written.inserted, page_started.elapsed(), oldest);

                    if progress.target_reached() {
                        break RunOutcome::TargetReached;
                    }
                    if pinned && full {
                        let e = format!(
                            "a full page of trades shares timestamp {}; resume from {} to step past that millisecond",
                            oldest,
                            oldest - 1
                        );
                        tracing::error!("[run] {} {}", &symbol, &e);
                        last_error = Some(e);
                        break RunOutcome::PausedOnError;
                    }
                    if pinned {
                        tracing::info!("[run] {} only trades at cursor {} are left; history exhausted", &symbol, oldest);
                        break RunOutcome::Exhausted;
                    }
                    if !self.stop.sleep(self.config.pacing).await {
                        break RunOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    last_error = Some(e.to_string());
                    pending = Some(current);
                    match self.after_failure(&e, &mut failures, cursor).await {
                        AfterFailure::Retry => continue,
                        AfterFailure::Stop => break RunOutcome::PausedOnError,
                    }
                }
            }
        };

        // a clean finish doesn't carry a stale error from a retried page
        let last_error = if outcome == RunOutcome::PausedOnError { last_error } else { None };
        let summary = progress.summary(outcome, cursor, last_error);
        match outcome {
            RunOutcome::PausedOnError => tracing::error!("[run] stopped: {}", &summary),
            RunOutcome::Cancelled => tracing::warn!("[run] stopped: {}", &summary),
            _ => tracing::info!("[run] finished: {}", &summary),
        }
        Ok(summary)
    }

    /// log the failure with what's needed to resume, then back off or give up
    async fn after_failure(&self, e: &BackfillError, failures: &mut u32, cursor: Option<i64>) -> AfterFailure {
        *failures += 1;
        tracing::warn!(
            "[after_failure] {} cursor {:?} attempt {}: {}",
            &self.config.symbol, &cursor, *failures, e
        );

        if !e.is_retryable() {
            tracing::error!("[after_failure] {} not retryable: {}", &self.config.symbol, e);
            return AfterFailure::Stop;
        }
        if !self.config.retry.allows_retry(*failures) {
            tracing::error!("[after_failure] {} giving up after {} attempts at cursor {:?}", &self.config.symbol, *failures, &cursor);
            return AfterFailure::Stop;
        }

        let delay = self.config.retry.backoff(*failures);
        tracing::info!("[after_failure] {} retrying cursor {:?} in {:?}", &self.config.symbol, &cursor, &delay);
        // a stop during the wait is picked up by the loop's next check
        let _ = self.stop.sleep(delay).await;
        AfterFailure::Retry
    }
}
