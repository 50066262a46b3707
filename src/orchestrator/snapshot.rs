//! Published snapshot types

use crate::feed::{Driver, Location, RaceControlMessage, WeatherSample};
use crate::standings::DriverStanding;
use crate::sync::LatestByKey;
use crate::track_status::TrackStatus;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};

/// A car's spot on the track map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverMapPosition {
    pub driver_number: u32,
    pub x: f64,
    pub y: f64,
    pub team_colour: String,
    pub acronym: String,
}

/// Consistent view of one live session, replaced wholesale each tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub session_key: u32,
    /// Increments once per publish
    pub sequence: u64,
    pub standings: Vec<DriverStanding>,
    pub track_status: TrackStatus,
    pub current_lap: u32,
    pub weather: Option<WeatherSample>,
    pub driver_map_positions: Vec<DriverMapPosition>,
    pub race_control: Vec<RaceControlMessage>,
}

impl Snapshot {
    /// Empty snapshot carrying only seed standings
    pub fn seed(session_key: u32, standings: Vec<DriverStanding>) -> Self {
        Self {
            session_key,
            sequence: 0,
            standings,
            track_status: TrackStatus::Green,
            current_lap: 0,
            weather: None,
            driver_map_positions: Vec::new(),
            race_control: Vec::new(),
        }
    }

    /// First row of the standings, ranked or not; `None` only with no roster
    pub fn leader(&self) -> Option<&DriverStanding> {
        self.standings.first()
    }
}

/// Map positions for every roster driver with a known location
pub fn map_positions(roster: &[Driver], locations: &LatestByKey<Location>) -> Vec<DriverMapPosition> {
    roster
        .iter()
        .filter_map(|driver| {
            let loc = locations.get(&driver.driver_number)?;
            Some(DriverMapPosition {
                driver_number: driver.driver_number,
                x: loc.x,
                y: loc.y,
                team_colour: driver.team_colour.clone(),
                acronym: driver.name_acronym.clone(),
            })
        })
        .collect()
}

/// Where snapshots and notifications go
///
/// Snapshots are latest-value: slow readers see only the newest one.
/// Notifications are a fan-out stream of race-control messages.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    snapshots: watch::Sender<Option<Snapshot>>,
    notifications: broadcast::Sender<RaceControlMessage>,
}

impl SnapshotSink {
    pub fn new(
        snapshots: watch::Sender<Option<Snapshot>>,
        notifications: broadcast::Sender<RaceControlMessage>,
    ) -> Self {
        Self {
            snapshots,
            notifications,
        }
    }

    /// Sink with fresh channels, returning the snapshot receiver
    pub fn channel(capacity: usize) -> (Self, watch::Receiver<Option<Snapshot>>) {
        let (snapshots, rx) = watch::channel(None);
        let (notifications, _) = broadcast::channel(capacity);
        (Self::new(snapshots, notifications), rx)
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<Snapshot>> {
        self.snapshots.subscribe()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<RaceControlMessage> {
        self.notifications.subscribe()
    }

    pub(crate) fn publish(&self, snapshot: Snapshot) {
        self.snapshots.send_replace(Some(snapshot));
    }

    pub(crate) fn notify(&self, message: RaceControlMessage) {
        // No subscribers is fine
        let _ = self.notifications.send(message);
    }
}
