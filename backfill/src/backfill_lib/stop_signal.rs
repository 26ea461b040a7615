//! stop_signal.rs
//!
//! Cooperative cancellation. The controller checks it between pages and while pausing, so a page
//! that's already being written always finishes first.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal::default()
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep unless stopped first. Returns false when the sleep was cut short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
