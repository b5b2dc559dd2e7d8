//! Per-item work performed by a scan

use async_trait::async_trait;
use thiserror::Error;

use super::{CancelFlag, Checkpoint};

/// Why one item produced no outcome
#[derive(Error, Debug)]
pub enum ItemError {
    /// Cancellation observed at a checkpoint inside the action
    #[error("Cancelled {0}")]
    Cancelled(Checkpoint),

    /// The item failed; the scan logs it and moves on
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// One discovered entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredEntry {
    pub name: String,
    pub payload: String,
}

/// What one item produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemOutcome {
    pub entries: Vec<DiscoveredEntry>,
}

impl ItemOutcome {
    /// Item processed, nothing found
    pub fn none() -> Self {
        Self::default()
    }

    pub fn entry(name: impl Into<String>, payload: impl Into<String>) -> Self {
        let mut outcome = Self::none();
        outcome.push(name, payload);
        outcome
    }

    pub fn push(&mut self, name: impl Into<String>, payload: impl Into<String>) {
        self.entries.push(DiscoveredEntry {
            name: name.into(),
            payload: payload.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-item view of the running job handed to [`ScanAction::perform`]
#[derive(Debug, Clone)]
pub struct ItemContext {
    cancel: CancelFlag,
    index: usize,
    total: usize,
}

impl ItemContext {
    pub fn new(cancel: CancelFlag, index: usize, total: usize) -> Self {
        Self { cancel, index, total }
    }

    /// Zero-based position of the item in the job
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn checkpoint(&self, at: Checkpoint) -> Result<(), ItemError> {
        self.cancel.checkpoint(at)
    }
}

/// The outbound action a scan runs once per work item
///
/// Implementations call [`ItemContext::checkpoint`] before sending, after
/// receiving and before parsing.
#[async_trait]
pub trait ScanAction<T>: Send + Sync {
    async fn perform(&self, item: &T, ctx: &ItemContext) -> Result<ItemOutcome, ItemError>;
}
