//! progress.rs
//!
//! per-run counters, the per-page progress line and the terminal summary

use std::fmt;
use std::time::{Duration, Instant};
use chrono::{TimeZone, Utc};
use strum::Display;

/// how a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunOutcome {
    /// the source returned an empty page
    Exhausted,
    TargetReached,
    /// retries ran out or the failure wasn't retryable; cursor/collected are the resume point
    PausedOnError,
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Exhausted | RunOutcome::TargetReached)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub symbol: String,
    pub outcome: RunOutcome,
    /// records written this run plus any count carried in from a resumed run
    pub collected: u64,
    /// rows that were new to fact_trades
    pub inserted: u64,
    pub pages: u64,
    pub elapsed: Duration,
    /// oldest timestamp written, the bound to resume from; None if no page was written
    pub cursor: Option<i64>,
    pub last_error: Option<String>,
}

impl RunSummary {
    pub fn average_per_sec(&self) -> f64 {
        per_sec(self.collected, self.elapsed)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {}: {} trades collected ({} new) in {:.2}s over {} pages, {:.0} trades/sec, cursor {}",
            &self.symbol,
            &self.outcome,
            self.collected,
            self.inserted,
            self.elapsed.as_secs_f64(),
            self.pages,
            self.average_per_sec(),
            cursor_text(self.cursor),
        )?;
        if let Some(e) = &self.last_error {
            write!(f, ", last error: {}", e)?;
        }
        Ok(())
    }
}

pub struct Progress {
    symbol: String,
    target: u64,
    started: Instant,
    collected: u64,
    inserted: u64,
    pages: u64,
}

impl Progress {
    pub fn new(symbol: &str, target: u64, already_collected: u64) -> Progress {
        Progress {
            symbol: symbol.to_string(),
            target,
            started: Instant::now(),
            collected: already_collected,
            inserted: 0,
            pages: 0,
        }
    }

    pub fn collected(&self) -> u64 {
        self.collected
    }

    pub fn target_reached(&self) -> bool {
        self.collected >= self.target
    }

    /// count a written page and report it
    pub fn record_page(&mut self, page_len: usize, inserted: u64, page_elapsed: Duration, cursor: i64) {
        self.collected += page_len as u64;
        self.inserted += inserted;
        self.pages += 1;

        tracing::info!(
            "[progress] {} {}/{} trades collected (+{}, {} new) {:.0}/s now, {:.0}/s avg, cursor {}",
            &self.symbol,
            self.collected,
            self.target,
            page_len,
            inserted,
            per_sec(page_len as u64, page_elapsed),
            per_sec(self.collected, self.started.elapsed()),
            cursor_text(Some(cursor)),
        );
    }

    pub fn summary(&self, outcome: RunOutcome, cursor: Option<i64>, last_error: Option<String>) -> RunSummary {
        RunSummary {
            symbol: self.symbol.clone(),
            outcome,
            collected: self.collected,
            inserted: self.inserted,
            pages: self.pages,
            elapsed: self.started.elapsed(),
            cursor,
            last_error,
        }
    }
}

fn per_sec(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        count as f64 / secs
    } else {
        0.0
    }
}

fn cursor_text(cursor: Option<i64>) -> String {
    match cursor {
        Some(ms) => match Utc.timestamp_millis_opt(ms).single() {
            Some(dtg) => format!("{} ({})", ms, dtg.to_rfc3339()),
            None => ms.to_string(),
        },
        None => "none".to_string(),
    }
}
