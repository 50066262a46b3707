//! Timing feed record types
//!
//! One struct per collaborator stream. Timestamps are ISO-8601 on the wire
//! and parsed into `DateTime<Utc>`; numeric fields are `f64`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled session (practice, qualifying, sprint, race)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_key: u32,
    pub meeting_key: u32,
    pub circuit_key: u32,
    #[serde(default)]
    pub circuit_short_name: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub year: i32,
    pub date_start: DateTime<Utc>,
    /// Missing while the session is still running on some feeds
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
    pub session_name: String,
    pub session_type: String,
    /// Set by the lifecycle controller, never by the feed
    #[serde(default)]
    pub is_live: bool,
}

impl Session {
    /// Whether this is a race-type session (race or sprint race)
    pub fn is_race(&self) -> bool {
        self.session_type.contains("Race")
    }
}

/// Static roster entry for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub driver_number: u32,
    #[serde(default)]
    pub broadcast_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub name_acronym: String,
    #[serde(default)]
    pub team_name: String,
    #[serde(default)]
    pub team_colour: String,
}

/// Rank of one car at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub position: u32,
}

/// A gap or interval reading
///
/// Usually seconds, but lapped cars are reported with a text marker such as
/// `"+1 LAP"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GapValue {
    Seconds(f64),
    Text(String),
}

impl GapValue {
    /// Numeric seconds, if this is a timed gap
    pub fn seconds(&self) -> Option<f64> {
        match self {
            GapValue::Seconds(s) => Some(*s),
            GapValue::Text(_) => None,
        }
    }
}

/// Timing gaps for one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub gap_to_leader: Option<GapValue>,
    #[serde(default)]
    pub interval: Option<GapValue>,
}

/// Track coordinates of one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Car telemetry sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarData {
    pub session_key: u32,
    pub driver_number: u32,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub rpm: f64,
    #[serde(default)]
    pub n_gear: u32,
    #[serde(default)]
    pub throttle: f64,
    #[serde(default)]
    pub brake: f64,
    /// Flap state channel; values above the open threshold mean the flap is open
    #[serde(default)]
    pub drs: u32,
}

/// Flag or incident message from race control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceControlMessage {
    pub session_key: u32,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub lap_number: Option<u32>,
    #[serde(default)]
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub driver_number: Option<u32>,
}

/// Ambient conditions sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    pub session_key: u32,
    pub date: DateTime<Utc>,
    pub air_temperature: f64,
    pub track_temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub rainfall: f64,
    pub wind_direction: f64,
    pub wind_speed: f64,
}

/// A completed lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lap {
    pub session_key: u32,
    pub driver_number: u32,
    pub lap_number: u32,
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lap_duration: Option<f64>,
    #[serde(default)]
    pub is_pit_out_lap: bool,
}

/// One tyre stint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stint {
    pub session_key: u32,
    pub driver_number: u32,
    pub stint_number: u32,
    #[serde(default)]
    pub compound: Option<String>,
    #[serde(default)]
    pub lap_start: Option<u32>,
    #[serde(default)]
    pub lap_end: Option<u32>,
    #[serde(default)]
    pub tyre_age_at_start: Option<u32>,
}

/// Map a raw team name onto its canonical constructor name
pub fn normalize_team_name(name: &str) -> String {
    if name.is_empty() {
        return "Unknown".to_string();
    }
    let n = name.to_lowercase();

    let canonical = if n.contains("stake") || (n.contains("kick") && n.contains("sauber")) {
        "Kick Sauber"
    } else if n.contains("visa") || n.contains("vcarb") || n.contains("rb") {
        "VCARB"
    } else if n.contains("audi") {
        "Audi"
    } else if n.contains("haas") {
        "Haas F1 Team"
    } else if n.contains("aston") {
        "Aston Martin"
    } else if n.contains("red bull") {
        "Red Bull Racing"
    } else if n.contains("mercedes") {
        "Mercedes"
    } else if n.contains("ferrari") {
        "Ferrari"
    } else if n.contains("mclaren") {
        "McLaren"
    } else if n.contains("alpine") {
        "Alpine"
    } else if n.contains("williams") {
        "Williams"
    } else {
        return name.to_string();
    };

    canonical.to_string()
}
