//! Track status module
//!
//! Turns the append-only race-control log into a single current flag and
//! emits each newly appended message once as a notification.
//!
//! The classifier always scans the whole log, newest first, so a later
//! unrelated message never masks a flag raised earlier and not rescinded.
//! CHEQUERED is terminal for the rest of the session.

use crate::feed::RaceControlMessage;
use serde::{Deserialize, Serialize};

/// Current track condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackStatus {
    #[default]
    Green,
    Yellow,
    #[serde(rename = "SC")]
    SafetyCar,
    #[serde(rename = "VSC")]
    VirtualSafetyCar,
    Red,
    Chequered,
}

impl TrackStatus {
    /// Whether no later evaluation may replace this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Chequered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Green => "GREEN",
            TrackStatus::Yellow => "YELLOW",
            TrackStatus::SafetyCar => "SC",
            TrackStatus::VirtualSafetyCar => "VSC",
            TrackStatus::Red => "RED",
            TrackStatus::Chequered => "CHEQUERED",
        }
    }
}

impl std::fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Status implied by a single message text, if any rule matches
///
/// Rules are checked in precedence order; the first match wins.
pub fn status_for_message(text: &str) -> Option<TrackStatus> {
    let m = text.to_uppercase();

    if m.contains("CHEQUERED") {
        Some(TrackStatus::Chequered)
    } else if m.contains("RED FLAG") {
        Some(TrackStatus::Red)
    } else if m.contains("VIRTUAL SAFETY CAR") && !m.contains("ENDING") {
        Some(TrackStatus::VirtualSafetyCar)
    } else if m.contains("SAFETY CAR") && !m.contains("IN THIS LAP") && !m.contains("ENDING") {
        Some(TrackStatus::SafetyCar)
    } else if m.contains("TRACK CLEAR") || m.contains("GREEN FLAG") || m.contains("VSC ENDING") {
        Some(TrackStatus::Green)
    } else {
        None
    }
}

/// Classify the full log given the previously published status
///
/// Scans from the newest message backward and stops at the first match.
/// No match means GREEN. A terminal previous status is returned unchanged.
pub fn classify(log: &[RaceControlMessage], previous: TrackStatus) -> TrackStatus {
    if previous.is_terminal() {
        return previous;
    }

    log.iter()
        .rev()
        .find_map(|msg| status_for_message(&msg.message))
        .unwrap_or_default()
}

/// Result of observing the log once
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub status: TrackStatus,
    /// The new tail message, at most once per growth of the log
    pub notification: Option<RaceControlMessage>,
}

/// Tracks status and notification state across ticks
#[derive(Debug, Clone, Default)]
pub struct TrackStatusMonitor {
    status: TrackStatus,
    seen: usize,
}

impl TrackStatusMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TrackStatus {
        self.status
    }

    /// Number of messages observed so far
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Observe the latest full log
    ///
    /// A log shorter than one already seen is a partial page: the prior
    /// status stands and nothing is emitted.
    pub fn observe(&mut self, log: &[RaceControlMessage]) -> Observation {
        if log.len() < self.seen {
            tracing::debug!(
                fetched = log.len(),
                seen = self.seen,
                "Race control log shorter than observed, keeping status"
            );
            return Observation {
                status: self.status,
                notification: None,
            };
        }

        self.status = classify(log, self.status);

        let notification = if log.len() > self.seen {
            self.seen = log.len();
            log.last().cloned()
        } else {
            None
        };

        Observation {
            status: self.status,
            notification,
        }
    }
}
