//! Standings types

use crate::feed::Driver;
use serde::{Deserialize, Serialize};

/// Position given to drivers with no known rank; sorts after every real one
pub const UNRANKED_POSITION: u32 = 99;

/// Rear-wing aero mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AeroMode {
    /// Low drag, flap open
    #[serde(rename = "X-MODE")]
    XMode,
    /// High downforce, flap closed
    #[serde(rename = "Z-MODE")]
    ZMode,
}

impl AeroMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AeroMode::XMode => "X-MODE",
            AeroMode::ZMode => "Z-MODE",
        }
    }
}

/// Manual override availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomStatus {
    Ready,
    Unavailable,
}

impl MomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MomStatus::Ready => "READY",
            MomStatus::Unavailable => "UNAVAILABLE",
        }
    }
}

/// Current tyre for a driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TyreInfo {
    pub compound: String,
    pub pit_count: u32,
}

/// One row of the derived standings
///
/// Recomputed from scratch each tick; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverStanding {
    #[serde(flatten)]
    pub driver: Driver,
    pub position: u32,
    pub grid_position: u32,
    /// Places gained since the start (negative when lost)
    pub pos_change: i64,
    pub gap: String,
    pub interval: String,
    pub aero_status: AeroMode,
    pub mom_status: MomStatus,
    pub tyre: Option<TyreInfo>,
}

impl DriverStanding {
    pub fn driver_number(&self) -> u32 {
        self.driver.driver_number
    }

    pub fn is_ranked(&self) -> bool {
        self.position != UNRANKED_POSITION
    }
}
