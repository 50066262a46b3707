//! Engine error types

use thiserror::Error;

/// Failures surfaced by the synchronization engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// No session could be acquired within the retry budget
    #[error("Connection lost: no session acquired after {attempts} attempts")]
    ConnectionLost { attempts: u32 },
    /// The session listing returned nothing for the current or prior year
    #[error("No sessions listed for {year} or {prior}", prior = .year - 1)]
    NoSessions { year: i32 },
    /// Every stream failed during a poll tick
    #[error("All streams failed for session {session_key}")]
    TickFailed { session_key: u32 },
}
