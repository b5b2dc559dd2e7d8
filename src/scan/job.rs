//! Scan jobs and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a scan job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled | JobState::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobState::Idle => "Idle",
            JobState::Running => "Running",
            JobState::Completed => "Completed",
            JobState::Cancelled => "Cancelled",
            JobState::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An ordered list of work items bound for one result destination
#[derive(Debug, Clone)]
pub struct ScanJob<T> {
    pub id: Uuid,
    pub items: Vec<T>,
    pub destination: String,
}

impl<T> ScanJob<T> {
    pub fn new(items: Vec<T>, destination: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            items,
            destination: destination.into(),
        }
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}

/// Completed/total counters owned by the worker running a job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub done: usize,
    pub total: usize,
}

impl JobProgress {
    pub fn new(total: usize) -> Self {
        Self { done: 0, total }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// Final report of a job. Partial results are never discarded, so `found`
/// counts everything written before the job stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: Uuid,
    pub destination: String,
    pub state: JobState,
    pub done: usize,
    pub total: usize,
    /// Entries written to the destination by this job
    pub found: usize,
    /// Items whose action failed and were skipped
    pub failed_items: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Reason for a `Failed` state
    pub error: Option<String>,
}
