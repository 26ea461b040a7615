//! retry.rs
//!
//! Backoff for fetch/write failures. The controller retries the same cursor position; this only
//! decides whether another attempt is allowed and how long to wait first.

use std::time::Duration;
use common_lib::settings::Settings;
use rand::Rng;

// fraction of the delay added as random jitter
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// attempts per page including the first; None retries forever
    pub max_attempts: Option<u32>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: Some(5),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> RetryPolicy {
        RetryPolicy {
            max_attempts: settings.retry_max,
            initial_backoff: settings.retry_base,
            max_backoff: settings.retry_cap,
            ..RetryPolicy::default()
        }
    }

    /// give up on the first failure
    pub fn never() -> RetryPolicy {
        RetryPolicy { max_attempts: Some(1), ..RetryPolicy::default() }
    }

    /// `failures` consecutive failures so far on the current page
    pub fn allows_retry(&self, failures: u32) -> bool {
        match self.max_attempts {
            Some(max) => failures < max,
            None => true,
        }
    }

    /// delay before the retry that follows failure number `failures` (1-based)
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(32) as i32;
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let base = base.min(self.max_backoff.as_secs_f64());

        let delay = if self.jitter && base > 0.0 {
            base + rand::thread_rng().gen_range(0.0..=base * JITTER_FRACTION)
        } else {
            base
        };
        Duration::from_secs_f64(delay.min(self.max_backoff.as_secs_f64()))
    }
}
