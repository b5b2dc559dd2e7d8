//! Inter-item delay policy

use std::time::Duration;

use super::CancelFlag;
use crate::app::ScanConfig;

/// Longest uninterrupted sleep while throttling, so cancellation is noticed promptly
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// Delay inserted between consecutive items
///
/// Dispatch is always sequential. The thread count only picks the delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    delay: Duration,
}

impl ThrottlePolicy {
    pub fn none() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// 200 ms for a single thread, 100 ms for more
    pub fn from_thread_count(threads: usize) -> Self {
        if threads > 1 {
            Self::fixed(Duration::from_millis(100))
        } else {
            Self::fixed(Duration::from_millis(200))
        }
    }

    /// An explicit `delay_ms` wins over the thread-derived delay
    pub fn from_config(config: &ScanConfig) -> Self {
        match config.delay_ms {
            Some(ms) => Self::fixed(Duration::from_millis(ms)),
            None => Self::from_thread_count(config.threads),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep for the delay. Returns false as soon as cancellation is seen.
    pub async fn pause(&self, cancel: &CancelFlag) -> bool {
        let mut remaining = self.delay;
        while !remaining.is_zero() {
            if cancel.is_cancelled() {
                return false;
            }
            let slice = remaining.min(PAUSE_SLICE);
            tokio::time::sleep(slice).await;
            remaining -= slice;
        }
        !cancel.is_cancelled()
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::from_thread_count(1)
    }
}
