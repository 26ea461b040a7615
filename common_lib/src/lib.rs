//! common_lib/src/lib.rs

pub mod archive;
pub mod binance_rest;
pub mod error;
pub mod init;
pub mod normalized_trade;
pub mod pair;
pub mod settings;
pub mod sqlx_pool;
pub mod trade_record;
pub mod trade_store;
