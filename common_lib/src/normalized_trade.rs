//! normalized_trade.rs
//!
//! typed projection of a TradeRecord stored in fact_trades

use std::str::FromStr;
use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use crate::error::BackfillError;
use crate::trade_record::TradeRecord;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NormalizedTrade {
    pub trade_id: i64,
    pub pair_id: i32,
    pub price: BigDecimal,
    pub quantity: BigDecimal,
    pub trade_time: DateTime<Utc>,
    pub is_buyer_maker: bool,
}

impl NormalizedTrade {
    pub fn from_record(record: &TradeRecord, pair_id: i32) -> Result<NormalizedTrade, BackfillError> {
        let invalid = |reason: String| BackfillError::InvalidRecord { trade_id: record.trade_id, reason };

        let price = BigDecimal::from_str(record.price.trim())
            .map_err(|e| invalid(format!("price '{}': {}", &record.price, e)))?;
        let quantity = BigDecimal::from_str(record.quantity.trim())
            .map_err(|e| invalid(format!("quantity '{}': {}", &record.quantity, e)))?;
        let trade_time = Utc
            .timestamp_millis_opt(record.timestamp_ms)
            .single()
            .ok_or_else(|| invalid(format!("timestamp {} out of range", record.timestamp_ms)))?;

        Ok(NormalizedTrade {
            trade_id: record.trade_id,
            pair_id,
            price,
            quantity,
            trade_time,
            is_buyer_maker: record.is_buyer_maker,
        })
    }

    /// project a whole page; the first bad record fails the page
    pub fn from_records(records: &[TradeRecord], pair_id: i32) -> Result<Vec<NormalizedTrade>, BackfillError> {
        records.iter().map(|r| NormalizedTrade::from_record(r, pair_id)).collect()
    }
}
