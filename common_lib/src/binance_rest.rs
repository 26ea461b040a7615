//! binance_rest.rs
//!
//! One page of historical aggregate trades per call
//!
//! curl "https://api.binance.com/api/v3/aggTrades?symbol=BTCUSDT&limit=1000&endTime=1737388800000"
//!
//! The bound goes out unchanged as endTime, which Binance treats as inclusive: trades sharing the
//! bound's millisecond come back again and the relational insert ignores the ones already stored.
//! No retries happen in this module.

use std::time::Duration;
use async_trait::async_trait;
use serde_json::Value;
use crate::error::BackfillError;
use crate::settings::MAX_PAGE_SIZE;
use crate::trade_record::Page;

const AGG_TRADES_PATH: &str = "/api/v3/aggTrades";
// enough of an error body to see Binance's code/msg without flooding the log
const ERROR_BODY_LOG_LEN: usize = 300;

#[async_trait]
pub trait TradeSource: Send + Sync {
    /// The newest `limit` trades at or before `before_ms` (the newest trades overall when None).
    /// An empty page means nothing is left at or before the bound.
    async fn fetch_page(&self, symbol: &str, limit: u16, before_ms: Option<i64>) -> Result<Page, BackfillError>;
}

pub struct BinanceAggTrades {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceAggTrades {
    pub fn new(client: reqwest::Client, base_url: &str) -> BinanceAggTrades {
        BinanceAggTrades {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// the http timeout is enforced per request by the client
    pub fn client(timeout: Duration) -> Result<reqwest::Client, BackfillError> {
        reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackfillError::Settings(format!("http client: {}", e)))
    }

    pub fn url(&self) -> String {
        format!("{}{}", &self.base_url, AGG_TRADES_PATH)
    }

    /// query string parameters for one page
    pub fn query(symbol: &str, limit: u16, before_ms: Option<i64>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", symbol.to_uppercase()),
            ("limit", limit.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(before_ms) = before_ms {
            params.push(("endTime", before_ms.to_string()));
        }
        params
    }
}

#[async_trait]
impl TradeSource for BinanceAggTrades {
    async fn fetch_page(&self, symbol: &str, limit: u16, before_ms: Option<i64>) -> Result<Page, BackfillError> {
        if let Some(bound) = before_ms {
            if bound < 0 {
                // nothing exists before the epoch
                return Ok(Page::default());
            }
        }

        let params = BinanceAggTrades::query(symbol, limit, before_ms);
        tracing::debug!("[fetch_page] GET {} {:?}", self.url(), &params);

        let response = self.client.get(self.url()).query(&params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LOG_LEN).collect();
            tracing::warn!("[fetch_page] {} http {}: {}", symbol, status, &body);
            return Err(BackfillError::Fetch(format!("http {}: {}", status, body)));
        }

        let raw = response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| BackfillError::Fetch(format!("response body is not a trade array: {}", e)))?;

        Page::from_raw(raw)
    }
}
