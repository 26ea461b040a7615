//! trade_record.rs
//!
//! Aggregate trades as the Binance REST API sends them
//!
//! https://binance-docs.github.io/apidocs/spot/en/#compressed-aggregate-trades-list
//!
//! [
//!   {
//!     "a": 26129,         // Aggregate tradeId
//!     "p": "0.01633102",  // Price
//!     "q": "4.70443515",  // Quantity
//!     "f": 27781,         // First tradeId
//!     "l": 27781,         // Last tradeId
//!     "T": 1498793709153, // Timestamp
//!     "m": true,          // Was the buyer the maker?
//!     "M": true           // Was the trade the best price match?
//!   }
//! ]
//!

use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::error::BackfillError;

/// One trade as received. Price and quantity stay text until normalization.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TradeRecord {
    #[serde(rename = "a")]
    pub trade_id: i64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "T")]
    pub timestamp_ms: i64,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// A page of trades in the order the source emitted them.
///
/// `raw` holds the untouched documents for the archive, `records` the typed view of the same
/// documents; both have the same length and order.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<TradeRecord>,
    pub raw: Vec<Value>,
}

impl Page {
    /// decode a response body that must be a json array of trade objects
    pub fn from_raw(raw: Vec<Value>) -> Result<Page, BackfillError> {
        let records = raw
            .iter()
            .map(|doc| serde_json::from_value::<TradeRecord>(doc.clone()))
            .collect::<Result<Vec<TradeRecord>, serde_json::Error>>()
            .map_err(|e| BackfillError::Fetch(format!("malformed trade object: {}", e)))?;
        Ok(Page { records, raw })
    }

    /// build a page from typed records; the raw documents are their serialized form
    pub fn from_records(records: Vec<TradeRecord>) -> Page {
        let raw = records
            .iter()
            .map(|r| serde_json::to_value(r).unwrap_or(Value::Null))
            .collect();
        Page { records, raw }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// smallest timestamp in the page, found by scanning; the source order is not relied on
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.records.iter().map(|r| r.timestamp_ms).min()
    }

    /// (oldest, newest) timestamps in one scan; None for an empty page
    pub fn time_range(&self) -> Option<(i64, i64)> {
        self.records.iter().fold(None, |range, r| match range {
            None => Some((r.timestamp_ms, r.timestamp_ms)),
            Some((oldest, newest)) => Some((oldest.min(r.timestamp_ms), newest.max(r.timestamp_ms))),
        })
    }
}
