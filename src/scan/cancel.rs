//! Cooperative cancellation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::ItemError;

/// Shared flag for cooperative cancellation of a scan job.
///
/// Clone is cheap and shares state. Raised by the operator, polled by the
/// worker at [`Checkpoint`]s. The orchestrator hands out a new flag per job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation. Returns false if it was already requested.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    /// `Err(Cancelled(at))` if cancellation has been requested
    pub fn checkpoint(&self, at: Checkpoint) -> Result<(), ItemError> {
        if self.is_cancelled() {
            Err(ItemError::Cancelled(at))
        } else {
            Ok(())
        }
    }
}

/// Points at which a running job polls the cancel flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    BeforeDispatch,
    BeforeSend,
    AfterReceive,
    BeforeParse,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Checkpoint::BeforeDispatch => "before dispatch",
            Checkpoint::BeforeSend => "before send",
            Checkpoint::AfterReceive => "after receive",
            Checkpoint::BeforeParse => "before parse",
        };
        f.write_str(name)
    }
}
