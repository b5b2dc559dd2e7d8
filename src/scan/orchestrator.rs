//! Sequential, cancellable scan execution

use chrono::Utc;
use futures::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    CancelFlag, Checkpoint, ItemContext, ItemError, JobProgress, JobState, JobSummary, ResultSink,
    ScanAction, ScanJob, ThrottlePolicy,
};
use crate::error::ScanError;
use crate::results::{ResultLease, SharedResults};

/// Drives scan jobs one at a time
///
/// Items are dispatched strictly in order to the job's [`ScanAction`]. The
/// cancel flag is checked before every dispatch and at the action's own
/// checkpoints; whatever was accumulated before cancellation stays put.
///
/// Every activation gets a fresh [`CancelFlag`], so a handle kept from an
/// earlier job cannot cancel a later one.
pub struct ScanOrchestrator {
    state: Arc<RwLock<JobState>>,
    cancel: RwLock<CancelFlag>,
    throttle: ThrottlePolicy,
}

impl ScanOrchestrator {
    pub fn new(throttle: ThrottlePolicy) -> Self {
        Self {
            state: Arc::new(RwLock::new(JobState::Idle)),
            cancel: RwLock::new(CancelFlag::new()),
            throttle,
        }
    }

    pub fn state(&self) -> JobState {
        *self.state.read()
    }

    pub fn throttle(&self) -> ThrottlePolicy {
        self.throttle
    }

    /// Flag of the current, or most recent, job
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.read().clone()
    }

    /// Request cancellation of the running job
    pub fn cancel(&self) -> bool {
        if self.state() != JobState::Running {
            return false;
        }
        let first = self.cancel.read().cancel();
        if first {
            tracing::info!("Scan cancellation requested");
        }
        first
    }

    /// Start `job` on a background task
    ///
    /// Fails if a job is already running here or another job holds the
    /// destination's results.
    pub fn start<T>(
        &self,
        job: ScanJob<T>,
        results: &SharedResults,
        action: Arc<dyn ScanAction<T>>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<ScanHandle, ScanError>
    where
        T: Display + Send + Sync + 'static,
    {
        let (lease, cancel) = self.activate(&job, results)?;

        let job_id = job.id;
        let destination = job.destination.clone();
        let total = job.total();
        let state = self.state.clone();
        let handle_cancel = cancel.clone();
        let throttle = self.throttle;

        let task = tokio::spawn(async move {
            let summary = execute(&job, lease, action.as_ref(), sink.as_ref(), &cancel, throttle).await;
            *state.write() = summary.state;
            sink.on_job_finished(&summary);
            summary
        });

        Ok(ScanHandle {
            job_id,
            destination,
            total,
            cancel: handle_cancel,
            state: self.state.clone(),
            task,
        })
    }

    /// Run `job` to a terminal state on the current task
    pub async fn run<T>(
        &self,
        job: ScanJob<T>,
        results: &SharedResults,
        action: &dyn ScanAction<T>,
        sink: &dyn ResultSink,
    ) -> Result<JobSummary, ScanError>
    where
        T: Display + Send + Sync,
    {
        let (lease, cancel) = self.activate(&job, results)?;
        let summary = execute(&job, lease, action, sink, &cancel, self.throttle).await;
        *self.state.write() = summary.state;
        sink.on_job_finished(&summary);
        Ok(summary)
    }

    /// Idle/terminal -> Running, taking the results lease and a new cancel flag
    fn activate<T>(
        &self,
        job: &ScanJob<T>,
        results: &SharedResults,
    ) -> Result<(ResultLease, CancelFlag), ScanError> {
        if job.items.is_empty() {
            return Err(ScanError::NoItems);
        }

        let mut state = self.state.write();
        if *state == JobState::Running {
            return Err(ScanError::AlreadyRunning);
        }
        let lease = results
            .lease()
            .map_err(|_| ScanError::DestinationBusy(job.destination.clone()))?;

        let cancel = CancelFlag::new();
        *self.cancel.write() = cancel.clone();
        *state = JobState::Running;
        Ok((lease, cancel))
    }
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new(ThrottlePolicy::default())
    }
}

/// Handle to a job started with [`ScanOrchestrator::start`]
pub struct ScanHandle {
    job_id: Uuid,
    destination: String,
    total: usize,
    cancel: CancelFlag,
    state: Arc<RwLock<JobState>>,
    task: JoinHandle<JobSummary>,
}

impl ScanHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job's summary
    ///
    /// Panics in the action are reported by the worker itself. A task that
    /// died anyway (a panicking sink, runtime shutdown) is summarised as
    /// `Failed` with no progress.
    pub async fn join(self) -> JobSummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Scan worker aborted");
                *self.state.write() = JobState::Failed;
                JobSummary {
                    job_id: self.job_id,
                    destination: self.destination,
                    state: JobState::Failed,
                    done: 0,
                    total: self.total,
                    found: 0,
                    failed_items: 0,
                    started_at: Utc::now(),
                    elapsed_ms: 0,
                    error: Some(ScanError::WorkerAborted(e.to_string()).to_string()),
                }
            }
        }
    }
}

async fn execute<T>(
    job: &ScanJob<T>,
    lease: ResultLease,
    action: &dyn ScanAction<T>,
    sink: &dyn ResultSink,
    cancel: &CancelFlag,
    throttle: ThrottlePolicy,
) -> JobSummary
where
    T: Display + Send + Sync,
{
    let started_at = Utc::now();
    let started = Instant::now();
    let mut progress = JobProgress::new(job.total());
    let mut found = 0usize;
    let mut failed_items = 0usize;
    let mut state = JobState::Completed;
    let mut error = None;

    tracing::info!(
        job_id = %job.id,
        destination = %job.destination,
        total = progress.total,
        "Scan started"
    );

    'items: for (index, item) in job.items.iter().enumerate() {
        if index > 0 && !throttle.pause(cancel).await {
            state = JobState::Cancelled;
            break;
        }
        if cancel.checkpoint(Checkpoint::BeforeDispatch).is_err() {
            state = JobState::Cancelled;
            break;
        }

        let ctx = ItemContext::new(cancel.clone(), index, progress.total);
        let performed = match AssertUnwindSafe(action.perform(item, &ctx)).catch_unwind().await {
            Ok(performed) => performed,
            Err(panic) => {
                state = JobState::Failed;
                error = Some(ScanError::WorkerAborted(panic_message(panic.as_ref())).to_string());
                break;
            }
        };
        match performed {
            Ok(outcome) => {
                for entry in outcome.entries {
                    lease.add_entry(entry.name.clone(), entry.payload.clone());
                    found += 1;
                    if let Err(e) = sink.on_entry_added(&entry.name, &entry.payload) {
                        state = JobState::Failed;
                        error = Some(ScanError::SinkFailed(e.to_string()).to_string());
                        break 'items;
                    }
                }
            }
            Err(ItemError::Cancelled(at)) => {
                tracing::debug!(job_id = %job.id, item = %item, checkpoint = %at, "Cancellation observed");
                state = JobState::Cancelled;
                break;
            }
            Err(ItemError::Failed(e)) => {
                tracing::warn!(job_id = %job.id, item = %item, error = %e, "Item failed, skipping");
                failed_items += 1;
            }
        }

        progress.done += 1;
        tracing::debug!(job_id = %job.id, item = %item, done = progress.done, total = progress.total, "Item done");
        if let Err(e) = sink.on_progress(progress.done, progress.total) {
            state = JobState::Failed;
            error = Some(ScanError::SinkFailed(e.to_string()).to_string());
            break;
        }
    }

    match state {
        JobState::Failed => tracing::error!(
            job_id = %job.id,
            error = error.as_deref().unwrap_or_default(),
            done = progress.done,
            "Scan failed"
        ),
        _ => tracing::info!(
            job_id = %job.id,
            state = %state,
            done = progress.done,
            total = progress.total,
            found,
            "Scan stopped"
        ),
    }

    JobSummary {
        job_id: job.id,
        destination: job.destination.clone(),
        state,
        done: progress.done,
        total: progress.total,
        found,
        failed_items,
        started_at,
        elapsed_ms: started.elapsed().as_millis() as u64,
        error,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("action panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("action panicked: {}", msg)
    } else {
        "action panicked".to_string()
    }
}
