//! Relevant-session selection

use crate::feed::Session;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Where the lifecycle controller currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Looking for a session, possibly retrying
    Acquiring,
    /// A session is running; polling is active
    Live,
    /// Next session has not started; probing periodically
    Upcoming,
    /// Nothing live or upcoming; showing the most recent session
    CompletedFallback,
    /// Acquisition retries exhausted; no further automatic attempts
    ConnectionError,
}

/// The one session chosen from a listing
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Live(Session),
    Upcoming(Session),
    Completed(Session),
}

impl Selection {
    pub fn session(&self) -> &Session {
        match self {
            Selection::Live(s) | Selection::Upcoming(s) | Selection::Completed(s) => s,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            Selection::Live(s) | Selection::Upcoming(s) | Selection::Completed(s) => s,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self {
            Selection::Live(_) => SessionPhase::Live,
            Selection::Upcoming(_) => SessionPhase::Upcoming,
            Selection::Completed(_) => SessionPhase::CompletedFallback,
        }
    }
}

/// Picks live, next, or last session from a listing
#[derive(Debug, Clone)]
pub struct SessionSelector {
    live_window: Duration,
}

impl Default for SessionSelector {
    fn default() -> Self {
        Self::new(Duration::hours(4))
    }
}

impl SessionSelector {
    /// `live_window` covers started sessions whose end is unknown or stale
    pub fn new(live_window: Duration) -> Self {
        Self { live_window }
    }

    /// Whether `session` counts as running at `now`
    pub fn is_live_at(&self, session: &Session, now: DateTime<Utc>) -> bool {
        let start = session.date_start;
        if start > now {
            return false;
        }

        let ongoing = session.date_end.is_some_and(|end| end >= now);
        let likely_live = now - start < self.live_window;
        ongoing || likely_live
    }

    /// Last instant at which `session` still counts as running
    pub fn live_until(&self, session: &Session) -> DateTime<Utc> {
        let window_end = session.date_start + self.live_window;
        session
            .date_end
            .map_or(window_end, |end| end.max(window_end))
    }

    /// Select the relevant session at `now`
    ///
    /// First live session in listing order, else the earliest upcoming one,
    /// else the most recently started one. `None` only for an empty listing.
    pub fn select_at(&self, sessions: &[Session], now: DateTime<Utc>) -> Option<Selection> {
        if let Some(live) = sessions.iter().find(|s| self.is_live_at(s, now)) {
            return Some(Selection::Live(Session {
                is_live: true,
                ..live.clone()
            }));
        }

        let mark_idle = |s: &Session| Session {
            is_live: false,
            ..s.clone()
        };

        if let Some(next) = sessions
            .iter()
            .filter(|s| s.date_start > now)
            .min_by_key(|s| s.date_start)
        {
            return Some(Selection::Upcoming(mark_idle(next)));
        }

        sessions
            .iter()
            .filter(|s| s.date_start <= now)
            .min_by_key(|s| Reverse(s.date_start))
            .map(|s| Selection::Completed(mark_idle(s)))
    }

    /// Most recently finished race session at `now`
    pub fn last_completed_race(&self, sessions: &[Session], now: DateTime<Utc>) -> Option<Session> {
        sessions
            .iter()
            .filter(|s| s.session_name == "Race")
            .filter_map(|s| s.date_end.filter(|end| *end < now).map(|end| (end, s)))
            .min_by_key(|(end, _)| Reverse(*end))
            .map(|(_, s)| Session {
                is_live: false,
                ..s.clone()
            })
    }
}
