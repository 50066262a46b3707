//! Live session orchestration
//!
//! Drives the per-tick fetch, merge, classify and derive cycle for one
//! session and publishes the result as an immutable snapshot.

mod poller;
mod snapshot;

pub use poller::{PollExit, PollingOrchestrator, TickReport};
pub use snapshot::{map_positions, DriverMapPosition, Snapshot, SnapshotSink};
