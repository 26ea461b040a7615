//! error.rs
//!
//! Failure taxonomy for a backfill run. Retryable and fatal conditions are told apart by variant.

use strum::Display;
use thiserror::Error;

/// Which half of the dual-sink write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum WriteStage {
    Archive,
    Relational,
}

#[derive(Error, Debug)]
pub enum BackfillError {
    /// the pair has no row in the dimension table; the operator has to provision it
    #[error("configuration error: {0}")]
    Configuration(String),

    /// the pair lookup query itself failed
    #[error("pair lookup failed: {0}")]
    Lookup(String),

    /// network, http status or body decoding failure against the trade API
    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("{stage} write failed: {message}")]
    Write { stage: WriteStage, message: String },

    /// a record that can't be projected into the relational shape
    #[error("invalid trade record {trade_id}: {reason}")]
    InvalidRecord { trade_id: i64, reason: String },

    /// could not reach a store at startup
    #[error("connection failed: {0}")]
    Connection(String),

    /// a pipeline task panicked or was aborted
    #[error("task failed: {0}")]
    Task(String),

    /// bad or missing environment value
    #[error("settings error: {0}")]
    Settings(String),
}

impl BackfillError {
    pub fn archive(e: impl std::fmt::Display) -> BackfillError {
        BackfillError::Write { stage: WriteStage::Archive, message: e.to_string() }
    }

    pub fn relational(e: impl std::fmt::Display) -> BackfillError {
        BackfillError::Write { stage: WriteStage::Relational, message: e.to_string() }
    }

    /// fetch and write failures are transient; everything else stops the run
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackfillError::Fetch(_) | BackfillError::Write { .. })
    }
}

impl From<reqwest::Error> for BackfillError {
    fn from(e: reqwest::Error) -> Self {
        BackfillError::Fetch(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn retryable_by_variant() {
        assert!(BackfillError::Fetch("timeout".to_string()).is_retryable());
        assert!(BackfillError::archive("disk full").is_retryable());
        assert!(BackfillError::relational("deadlock").is_retryable());
        assert!(!BackfillError::Configuration("no pair".to_string()).is_retryable());
        assert!(!BackfillError::Lookup("down".to_string()).is_retryable());
        assert!(!BackfillError::InvalidRecord { trade_id: 1, reason: "x".to_string() }.is_retryable());
    }

    #[test]
    fn write_error_names_its_stage() {
        let e = BackfillError::relational("unique violation");
        assert_eq!(e.to_string(), "relational write failed: unique violation");
    }
}
