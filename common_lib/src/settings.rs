//! settings.rs
//!
//! backfill settings read from the environment (.env is loaded by init())

use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use crate::error::BackfillError;

pub const BINANCE_API_URL: &str = "https://api.binance.com";
/// Binance caps aggTrades at 1000 per call
pub const MAX_PAGE_SIZE: u16 = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ArchiveKind {
    Postgres,
    Jsonl,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub archive_database_url: String,
    pub archive_kind: ArchiveKind,
    pub archive_jsonl_path: String,
    pub binance_api_url: String,
    pub symbols: Vec<String>,
    pub target: u64,
    pub page_size: u16,
    pub pacing: Duration,
    /// None = retry forever
    pub retry_max: Option<u32>,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub http_timeout: Duration,
    pub db_max_connections: u32,
    pub start_before_ms: Option<i64>,
    pub already_collected: u64,
}

impl Settings {
    pub fn load() -> Result<Settings, BackfillError> {
        Settings::from_lookup(|key| std::env::var(key).ok())
    }

    /// build settings from any key lookup; load() passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Settings, BackfillError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| BackfillError::Settings("DATABASE_URL not found".to_string()))?;
        let archive_database_url = lookup("ARCHIVE_DATABASE_URL").unwrap_or_else(|| database_url.clone());

        let symbols: Vec<String> = lookup("BACKFILL_SYMBOLS")
            .unwrap_or_else(|| "BTCUSDT".to_owned())
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(BackfillError::Settings("BACKFILL_SYMBOLS is empty".to_string()));
        }

        let page_size: u16 = parse_or(&lookup, "BACKFILL_PAGE_SIZE", MAX_PAGE_SIZE)?;
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(BackfillError::Settings(format!("BACKFILL_PAGE_SIZE must be 1..={}, got {}", MAX_PAGE_SIZE, page_size)));
        }

        // 0 means unbounded
        let retry_max = match parse_or::<u32, _>(&lookup, "BACKFILL_RETRY_MAX", 5)? {
            0 => None,
            n => Some(n),
        };

        let start_before_ms = match lookup("BACKFILL_START_BEFORE_MS") {
            Some(v) => Some(parse_value::<i64>("BACKFILL_START_BEFORE_MS", &v)?),
            None => None,
        };

        Ok(Settings {
            database_url,
            archive_database_url,
            archive_kind: parse_or(&lookup, "ARCHIVE_KIND", ArchiveKind::Postgres)?,
            archive_jsonl_path: lookup("ARCHIVE_JSONL_PATH").unwrap_or_else(|| "raw_trades.jsonl".to_owned()),
            binance_api_url: lookup("BINANCE_API_URL").unwrap_or_else(|| BINANCE_API_URL.to_owned()),
            symbols,
            target: parse_or(&lookup, "BACKFILL_TARGET", 1_000_000)?,
            page_size,
            pacing: Duration::from_millis(parse_or(&lookup, "BACKFILL_PACING_MILLIS", 100)?),
            retry_max,
            retry_base: Duration::from_millis(parse_or(&lookup, "BACKFILL_RETRY_BASE_MILLIS", 5000)?),
            retry_cap: Duration::from_millis(parse_or(&lookup, "BACKFILL_RETRY_CAP_MILLIS", 60_000)?),
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10)?),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            start_before_ms,
            already_collected: parse_or(&lookup, "BACKFILL_ALREADY_COLLECTED", 0)?,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, BackfillError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, BackfillError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| BackfillError::Settings(format!("{}='{}': {}", key, value, e)))
}
