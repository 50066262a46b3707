//! Session lifecycle module
//!
//! Finds the session worth following, retries acquisition within a fixed
//! budget, waits for an upcoming session to go live, and prepares roster,
//! starting grid and initial watermark exactly once per live session.

mod controller;
mod retry;
mod roster;
mod selection;

pub use controller::{sync_origin, Acquired, LiveContext, SessionController};
pub use retry::{AcquireRetry, RetryDecision};
pub use roster::{grid_from_positions, load_grid, load_roster, MIN_SESSION_ROSTER};
pub use selection::{Selection, SessionPhase, SessionSelector};
