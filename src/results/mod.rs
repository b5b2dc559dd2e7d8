//! Scan result collection
//!
//! Entries discovered by a scan land in an insertion-ordered
//! [`ResultAccumulator`]. A [`SharedResults`] handle lets the operator read
//! the accumulator while one job at a time appends to it through a
//! [`ResultLease`]. [`ResultSessions`] names destinations and decides whether
//! a new job appends to the latest one or starts fresh.

mod accumulator;
mod names;
mod session;

pub use accumulator::{ResultAccumulator, ResultLease, SharedResults};
pub use names::DiscoveredNameSets;
pub use session::{ResultDestination, ResultSessions, SessionChoice};
