//! Receivers for scan progress and discovered entries

use anyhow::Result;
use tokio::sync::mpsc;

use super::JobSummary;

/// Receives updates from a running job
///
/// Called from the worker. An error from `on_entry_added` or `on_progress`
/// fails the job; entries already accumulated are kept.
pub trait ResultSink: Send + Sync {
    fn on_entry_added(&self, name: &str, payload: &str) -> Result<()>;

    fn on_progress(&self, done: usize, total: usize) -> Result<()>;

    fn on_job_finished(&self, summary: &JobSummary);
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ResultSink for NullSink {
    fn on_entry_added(&self, _name: &str, _payload: &str) -> Result<()> {
        Ok(())
    }

    fn on_progress(&self, _done: usize, _total: usize) -> Result<()> {
        Ok(())
    }

    fn on_job_finished(&self, _summary: &JobSummary) {}
}

/// Logs updates through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct LogSink {
    /// Log progress every this many items
    every: usize,
}

impl LogSink {
    pub fn new(every: usize) -> Self {
        Self { every: every.max(1) }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ResultSink for LogSink {
    fn on_entry_added(&self, name: &str, _payload: &str) -> Result<()> {
        tracing::info!(entry = %name, "Found");
        Ok(())
    }

    fn on_progress(&self, done: usize, total: usize) -> Result<()> {
        if done % self.every == 0 || done == total {
            tracing::info!(done, total, "Progress");
        }
        Ok(())
    }

    fn on_job_finished(&self, summary: &JobSummary) {
        tracing::info!(
            job_id = %summary.job_id,
            state = %summary.state,
            done = summary.done,
            total = summary.total,
            found = summary.found,
            "Scan finished"
        );
    }
}

/// Update forwarded by [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    EntryAdded { name: String, payload: String },
    Progress { done: usize, total: usize },
    Finished(JobSummary),
}

/// Forwards updates to a channel so another task can render them
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn on_entry_added(&self, name: &str, payload: &str) -> Result<()> {
        self.tx
            .send(SinkEvent::EntryAdded {
                name: name.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| anyhow::anyhow!("Result receiver closed"))
    }

    fn on_progress(&self, done: usize, total: usize) -> Result<()> {
        self.tx
            .send(SinkEvent::Progress { done, total })
            .map_err(|_| anyhow::anyhow!("Progress receiver closed"))
    }

    fn on_job_finished(&self, summary: &JobSummary) {
        let _ = self.tx.send(SinkEvent::Finished(summary.clone()));
    }
}
