//! Orchestrator scenarios with in-memory actions

use super::*;
use crate::error::ScanError;
use crate::results::{ResultSessions, SessionChoice, SharedResults};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Emits one entry per item; items starting with "bad" fail
struct EchoAction {
    tag: &'static str,
}

impl EchoAction {
    fn new() -> Self {
        Self { tag: "found" }
    }
}

#[async_trait]
impl ScanAction<String> for EchoAction {
    async fn perform(&self, item: &String, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        ctx.checkpoint(Checkpoint::BeforeSend)?;
        if item.starts_with("bad") {
            return Err(anyhow::anyhow!("no such object: {}", item).into());
        }
        ctx.checkpoint(Checkpoint::AfterReceive)?;
        Ok(ItemOutcome::entry(item.clone(), format!("{}:{}", self.tag, item)))
    }
}

/// Cancels the running job while "in flight" on one item
struct CancelMidway {
    orch: Arc<ScanOrchestrator>,
    at: usize,
}

#[async_trait]
impl ScanAction<String> for CancelMidway {
    async fn perform(&self, item: &String, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        ctx.checkpoint(Checkpoint::BeforeSend)?;
        if ctx.index() == self.at {
            self.orch.cancel();
        }
        ctx.checkpoint(Checkpoint::AfterReceive)?;
        Ok(ItemOutcome::entry(item.clone(), "x"))
    }
}

/// Waits until cancelled
struct StallAction;

#[async_trait]
impl ScanAction<String> for StallAction {
    async fn perform(&self, _item: &String, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        while !ctx.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ctx.checkpoint(Checkpoint::BeforeParse)?;
        Ok(ItemOutcome::none())
    }
}

/// Panics on the item at `at`, echoes the rest
struct PanicAt {
    at: usize,
}

#[async_trait]
impl ScanAction<String> for PanicAt {
    async fn perform(&self, item: &String, ctx: &ItemContext) -> Result<ItemOutcome, ItemError> {
        if ctx.index() == self.at {
            panic!("worker bug on {}", item);
        }
        Ok(ItemOutcome::entry(item.clone(), "x"))
    }
}

#[derive(Default)]
struct RecordingSink {
    entries: Mutex<Vec<String>>,
    progress: Mutex<Vec<(usize, usize)>>,
    finished: Mutex<Option<JobSummary>>,
    cancel_at: Option<(usize, Arc<ScanOrchestrator>)>,
    reject_entry: Option<&'static str>,
}

impl ResultSink for RecordingSink {
    fn on_entry_added(&self, name: &str, _payload: &str) -> anyhow::Result<()> {
        self.entries.lock().push(name.to_string());
        if self.reject_entry == Some(name) {
            anyhow::bail!("render failed for {}", name);
        }
        Ok(())
    }

    fn on_progress(&self, done: usize, total: usize) -> anyhow::Result<()> {
        self.progress.lock().push((done, total));
        if let Some((k, orch)) = &self.cancel_at {
            if done == *k {
                orch.cancel();
            }
        }
        Ok(())
    }

    fn on_job_finished(&self, summary: &JobSummary) {
        *self.finished.lock() = Some(summary.clone());
    }
}

fn items(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn names(results: &SharedResults) -> Vec<String> {
    results.read(|acc| acc.names_in_insertion_order().map(String::from).collect())
}

fn orchestrator() -> ScanOrchestrator {
    ScanOrchestrator::new(ThrottlePolicy::none())
}

#[tokio::test]
async fn test_completes_all_items_in_order() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let sink = RecordingSink::default();
    let job = ScanJob::new(items(&["Contact", "Account", "Lead"]), "Retrieved Objects 1");

    let summary = orch.run(job, &results, &EchoAction::new(), &sink).await.unwrap();

    assert_eq!(summary.state, JobState::Completed);
    assert_eq!((summary.done, summary.total, summary.found), (3, 3, 3));
    assert_eq!(names(&results), vec!["Contact", "Account", "Lead"]);
    assert_eq!(*sink.progress.lock(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(sink.finished.lock().as_ref().map(|s| s.state), Some(JobState::Completed));
    assert_eq!(orch.state(), JobState::Completed);
    assert!(!results.is_leased());
}

#[tokio::test]
async fn test_cancel_after_k_items_keeps_exactly_k() {
    let orch = Arc::new(orchestrator());
    let results = SharedResults::default();
    let sink = RecordingSink {
        cancel_at: Some((2, orch.clone())),
        ..Default::default()
    };
    let job = ScanJob::new(items(&["A", "B", "C", "D", "E"]), "dest");

    let summary = orch.run(job, &results, &EchoAction::new(), &sink).await.unwrap();

    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.done, 2);
    assert_eq!(summary.total, 5);
    assert_eq!(names(&results), vec!["A", "B"]);
    assert_eq!(sink.progress.lock().len(), 2);
}

#[tokio::test]
async fn test_cancel_inside_action_drops_in_flight_item() {
    let orch = Arc::new(orchestrator());
    let results = SharedResults::default();
    let action = CancelMidway {
        orch: orch.clone(),
        at: 1,
    };
    let job = ScanJob::new(items(&["A", "B", "C"]), "dest");

    let summary = orch.run(job, &results, &action, &NullSink).await.unwrap();

    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.done, 1);
    assert_eq!(names(&results), vec!["A"]);
}

#[tokio::test]
async fn test_item_failures_are_skipped() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let job = ScanJob::new(items(&["Account", "bad_Object", "Contact"]), "dest");

    let summary = orch.run(job, &results, &EchoAction::new(), &NullSink).await.unwrap();

    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.done, 3);
    assert_eq!(summary.failed_items, 1);
    assert_eq!(summary.found, 2);
    assert_eq!(names(&results), vec!["Account", "Contact"]);
}

#[tokio::test]
async fn test_sink_failure_fails_job_and_keeps_results() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let sink = RecordingSink {
        reject_entry: Some("Contact"),
        ..Default::default()
    };
    let job = ScanJob::new(items(&["Account", "Contact", "Lead"]), "dest");

    let summary = orch.run(job, &results, &EchoAction::new(), &sink).await.unwrap();

    assert_eq!(summary.state, JobState::Failed);
    assert!(summary.error.unwrap().contains("render failed for Contact"));
    assert_eq!(summary.done, 1);
    assert_eq!(names(&results), vec!["Account", "Contact"]);
    assert_eq!(orch.state(), JobState::Failed);
}

#[tokio::test]
async fn test_background_job_cancel_and_restart() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let job = ScanJob::new(items(&["A", "B"]), "dest");

    let handle = orch
        .start(job, &results, Arc::new(StallAction), Arc::new(NullSink))
        .unwrap();
    assert_eq!(orch.state(), JobState::Running);

    let other = SharedResults::default();
    let second = orch.start(
        ScanJob::new(items(&["X"]), "other"),
        &other,
        Arc::new(EchoAction::new()),
        Arc::new(NullSink),
    );
    assert_eq!(second.err(), Some(ScanError::AlreadyRunning));

    assert!(handle.cancel());
    let summary = handle.join().await;
    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.done, 0);
    assert_eq!(orch.state(), JobState::Cancelled);

    // The next activation gets a clear flag
    let summary = orch
        .run(ScanJob::new(items(&["X"]), "other"), &other, &EchoAction::new(), &NullSink)
        .await
        .unwrap();
    assert_eq!(summary.state, JobState::Completed);
}

#[tokio::test]
async fn test_one_job_per_destination() {
    let first = orchestrator();
    let second = orchestrator();
    let results = SharedResults::default();

    let handle = first
        .start(
            ScanJob::new(items(&["A"]), "Retrieved Objects 1"),
            &results,
            Arc::new(StallAction),
            Arc::new(NullSink),
        )
        .unwrap();

    let err = second
        .run(
            ScanJob::new(items(&["B"]), "Retrieved Objects 1"),
            &results,
            &EchoAction::new(),
            &NullSink,
        )
        .await
        .unwrap_err();
    assert_eq!(err, ScanError::DestinationBusy("Retrieved Objects 1".into()));
    assert_eq!(second.state(), JobState::Idle);

    handle.cancel();
    handle.join().await;
    assert!(!results.is_leased());
}

#[tokio::test]
async fn test_empty_job_is_rejected() {
    let orch = orchestrator();
    let err = orch
        .run(ScanJob::new(Vec::<String>::new(), "dest"), &SharedResults::default(), &EchoAction::new(), &NullSink)
        .await
        .unwrap_err();
    assert_eq!(err, ScanError::NoItems);
    assert_eq!(orch.state(), JobState::Idle);
}

#[tokio::test]
async fn test_action_panic_fails_job_with_progress() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let sink = Arc::new(RecordingSink::default());
    let handle = orch
        .start(
            ScanJob::new(items(&["A", "B", "C", "D"]), "dest"),
            &results,
            Arc::new(PanicAt { at: 2 }),
            sink.clone(),
        )
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_finished() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Settled without anyone joining
    assert_eq!(orch.state(), JobState::Failed);
    assert!(!results.is_leased());
    let reported = sink.finished.lock().clone().unwrap();
    assert_eq!(reported.state, JobState::Failed);
    assert_eq!((reported.done, reported.found), (2, 2));

    let summary = handle.join().await;
    assert_eq!(summary.state, JobState::Failed);
    assert_eq!((summary.done, summary.total, summary.found), (2, 4, 2));
    assert!(summary.error.unwrap().contains("worker bug on C"));
    assert_eq!(names(&results), vec!["A", "B"]);

    let again = orch
        .run(ScanJob::new(items(&["E"]), "dest"), &results, &EchoAction::new(), &NullSink)
        .await
        .unwrap();
    assert_eq!(again.state, JobState::Completed);
}

#[tokio::test]
async fn test_stale_handle_cannot_cancel_next_job() {
    let orch = orchestrator();
    let results = SharedResults::default();

    let first = orch
        .start(
            ScanJob::new(items(&["A"]), "dest"),
            &results,
            Arc::new(EchoAction::new()),
            Arc::new(NullSink),
        )
        .unwrap();
    let stale = first.cancel_flag();
    assert_eq!(first.join().await.state, JobState::Completed);

    let second = orch
        .start(
            ScanJob::new(items(&["X", "Y", "Z"]), "dest"),
            &results,
            Arc::new(EchoAction::new()),
            Arc::new(NullSink),
        )
        .unwrap();
    stale.cancel();

    let summary = second.join().await;
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.done, 3);
    assert!(!orch.cancel_flag().is_cancelled());
}

#[tokio::test]
async fn test_cancel_during_throttle_is_prompt() {
    let orch = ScanOrchestrator::new(ThrottlePolicy::fixed(Duration::from_secs(30)));
    let results = SharedResults::default();
    let handle = orch
        .start(
            ScanJob::new(items(&["A", "B", "C"]), "dest"),
            &results,
            Arc::new(EchoAction::new()),
            Arc::new(NullSink),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    assert!(orch.cancel());
    let summary = handle.join().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.done, 1);
    assert_eq!(names(&results), vec!["A"]);
}

#[tokio::test]
async fn test_channel_sink_event_order() {
    let orch = orchestrator();
    let results = SharedResults::default();
    let (sink, mut rx) = ChannelSink::new();

    orch.run(ScanJob::new(items(&["A", "B"]), "dest"), &results, &EchoAction::new(), &sink)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.len(), 5);
    assert_eq!(
        events[0],
        SinkEvent::EntryAdded {
            name: "A".into(),
            payload: "found:A".into()
        }
    );
    assert_eq!(events[1], SinkEvent::Progress { done: 1, total: 2 });
    assert!(matches!(&events[4], SinkEvent::Finished(s) if s.state == JobState::Completed));
}

#[tokio::test]
async fn test_append_session_replaces_payload() {
    let orch = orchestrator();
    let mut sessions = ResultSessions::new();

    let first = sessions.open(SessionChoice::Fresh);
    orch.run(
        ScanJob::new(items(&["X", "Y"]), first.name.clone()),
        &first.results,
        &EchoAction { tag: "first" },
        &NullSink,
    )
    .await
    .unwrap();

    let again = sessions.open(SessionChoice::Append);
    orch.run(
        ScanJob::new(items(&["Y", "Z"]), again.name.clone()),
        &again.results,
        &EchoAction { tag: "second" },
        &NullSink,
    )
    .await
    .unwrap();

    assert_eq!(names(&again.results), vec!["X", "Y", "Z"]);
    let snapshot = again.results.snapshot();
    assert_eq!(snapshot.get("Y"), Some("second:Y"));
    assert_eq!(snapshot.get("X"), Some("first:X"));
}
