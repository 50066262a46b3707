//! Per-stream watermark cursor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Incrementally fetched streams that carry a watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Locations,
    Positions,
    Weather,
}

impl Stream {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stream::Locations => "locations",
            Stream::Positions => "positions",
            Stream::Weather => "weather",
        }
    }
}

/// Tracks "consumed up to here" per stream
///
/// Bounds only ever move forward. An unset stream reads as the session
/// origin established at time-sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkCursor {
    origin: DateTime<Utc>,
    marks: HashMap<Stream, DateTime<Utc>>,
}

impl WatermarkCursor {
    /// Create a cursor whose unset streams start at `origin`
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            marks: HashMap::new(),
        }
    }

    /// Lower bound for the next fetch of `stream`
    pub fn get(&self, stream: Stream) -> DateTime<Utc> {
        self.marks.get(&stream).copied().unwrap_or(self.origin)
    }

    /// The bound unset streams fall back to
    pub fn origin(&self) -> DateTime<Utc> {
        self.origin
    }

    /// Move the bound forward if `latest` is strictly newer
    ///
    /// Returns true when the stored bound changed. `None` is a no-op.
    pub fn advance(&mut self, stream: Stream, latest: Option<DateTime<Utc>>) -> bool {
        let Some(latest) = latest else {
            return false;
        };

        match self.marks.get(&stream) {
            Some(current) if latest <= *current => false,
            None if latest < self.origin => false,
            _ => {
                self.marks.insert(stream, latest);
                true
            }
        }
    }
}
