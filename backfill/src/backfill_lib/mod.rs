//! backfill_lib
//!
//! historical trade backfill: controller, dual-sink writer, retry policy and progress reporting

pub mod backfill;
pub mod data_collector;
pub mod dual_sink;
pub mod progress;
pub mod retry;
pub mod stop_signal;
