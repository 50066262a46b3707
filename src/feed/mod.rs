//! Timing feed module
//!
//! External collaborators consumed by the engine: session listings, roster,
//! positions, intervals, locations, car telemetry, race control, weather,
//! laps and stints. Every request is scoped by session key and, for
//! incremental streams, a lower-bound timestamp.

mod client;
mod types;

pub use client::{OpenF1Client, OpenF1Config, OPENF1_API_URL};
pub use types::{
    normalize_team_name, CarData, Driver, GapValue, Interval, Lap, Location, Position,
    RaceControlMessage, Session, Stint, WeatherSample,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for timing feed implementations
///
/// Implementations may return empty or partial pages on any call. Errors
/// are reported, not retried forever; callers decide how a failure degrades.
#[async_trait]
pub trait TimingFeed: Send + Sync {
    /// All sessions scheduled in a calendar year
    async fn sessions(&self, year: i32) -> anyhow::Result<Vec<Session>>;

    /// Roster for a session
    async fn drivers(&self, session_key: u32) -> anyhow::Result<Vec<Driver>>;

    /// Roster entries across every session of a meeting
    async fn meeting_drivers(&self, meeting_key: u32) -> anyhow::Result<Vec<Driver>>;

    /// Position records, optionally only those after `since`
    async fn positions(
        &self,
        session_key: u32,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Position>>;

    /// Interval records for the whole session
    async fn intervals(&self, session_key: u32) -> anyhow::Result<Vec<Interval>>;

    /// Location samples after `since`
    async fn locations(
        &self,
        session_key: u32,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Location>>;

    /// Car telemetry samples after `since`
    async fn car_data(
        &self,
        session_key: u32,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CarData>>;

    /// Full race-control log, oldest first
    async fn race_control(&self, session_key: u32) -> anyhow::Result<Vec<RaceControlMessage>>;

    /// Weather samples, optionally only those after `since`
    async fn weather(
        &self,
        session_key: u32,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<WeatherSample>>;

    /// Completed laps of one driver
    async fn laps(&self, session_key: u32, driver_number: u32) -> anyhow::Result<Vec<Lap>>;

    /// Tyre stints for the whole session
    async fn stints(&self, session_key: u32) -> anyhow::Result<Vec<Stint>>;
}
