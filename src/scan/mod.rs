//! Bulk scan execution
//!
//! A [`ScanJob`] is an ordered list of work items. The [`ScanOrchestrator`]
//! feeds them one at a time to a [`ScanAction`], writes discovered entries to
//! the destination's results and reports to a [`ResultSink`]. Cancellation is
//! cooperative through a shared [`CancelFlag`].

mod action;
mod cancel;
mod job;
mod orchestrator;
mod sink;
mod throttle;

#[cfg(test)]
mod tests;

pub use action::{DiscoveredEntry, ItemContext, ItemError, ItemOutcome, ScanAction};
pub use cancel::{CancelFlag, Checkpoint};
pub use job::{JobProgress, JobState, JobSummary, ScanJob};
pub use orchestrator::{ScanHandle, ScanOrchestrator};
pub use sink::{ChannelSink, LogSink, NullSink, ResultSink, SinkEvent};
pub use throttle::ThrottlePolicy;
