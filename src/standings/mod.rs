//! Standings derivation
//!
//! Combines the roster with the latest position, interval and telemetry
//! records into one ranked list. Pure: identical inputs always produce an
//! identical list, field for field.

mod types;

pub use types::{AeroMode, DriverStanding, MomStatus, TyreInfo, UNRANKED_POSITION};

use crate::config::StandingsConfig;
use crate::feed::{CarData, Driver, GapValue, Interval, Position, Stint};
use crate::sync::LatestByKey;
use std::collections::BTreeMap;

/// Everything one derivation pass reads
pub struct StandingsInputs<'a> {
    pub roster: &'a [Driver],
    pub positions: &'a LatestByKey<Position>,
    pub intervals: &'a LatestByKey<Interval>,
    pub telemetry: &'a LatestByKey<CarData>,
    pub grid: &'a BTreeMap<u32, u32>,
    pub tyres: &'a BTreeMap<u32, TyreInfo>,
    pub previous: &'a [DriverStanding],
}

/// Derives ranked standings from per-driver stream state
#[derive(Debug, Clone, Default)]
pub struct StandingsEngine {
    config: StandingsConfig,
}

impl StandingsEngine {
    pub fn new(config: StandingsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StandingsConfig {
        &self.config
    }

    /// Derive the full standings for one tick
    pub fn derive(&self, inputs: &StandingsInputs<'_>) -> Vec<DriverStanding> {
        let previous: BTreeMap<u32, u32> = inputs
            .previous
            .iter()
            .map(|s| (s.driver_number(), s.position))
            .collect();

        let mut standings: Vec<DriverStanding> = inputs
            .roster
            .iter()
            .map(|driver| {
                let number = driver.driver_number;

                let position = inputs
                    .positions
                    .get(&number)
                    .map(|p| p.position)
                    .or_else(|| previous.get(&number).copied())
                    .unwrap_or(UNRANKED_POSITION);

                let grid_position = inputs.grid.get(&number).copied().unwrap_or(number);
                let interval = inputs.intervals.get(&number);

                DriverStanding {
                    driver: driver.clone(),
                    position,
                    grid_position,
                    pos_change: i64::from(grid_position) - i64::from(position),
                    gap: format_gap(interval.and_then(|i| i.gap_to_leader.as_ref()), position),
                    interval: format_interval(interval.and_then(|i| i.interval.as_ref())),
                    aero_status: self.aero_mode(inputs.telemetry.get(&number)),
                    mom_status: self.mom_status(interval),
                    tyre: inputs.tyres.get(&number).cloned(),
                }
            })
            .collect();

        // Stable: ties keep roster order
        standings.sort_by_key(|s| s.position);
        standings
    }

    fn aero_mode(&self, sample: Option<&CarData>) -> AeroMode {
        match sample {
            Some(car) if car.drs > self.config.drs_open_threshold => AeroMode::XMode,
            _ => AeroMode::ZMode,
        }
    }

    fn mom_status(&self, interval: Option<&Interval>) -> MomStatus {
        let secs = interval
            .and_then(|i| i.interval.as_ref())
            .and_then(GapValue::seconds);

        match secs {
            Some(s) if s > 0.0 && s < self.config.mom_window_secs => MomStatus::Ready,
            _ => MomStatus::Unavailable,
        }
    }
}

/// Seed standings published on entering a live session, before any data
///
/// Roster order stands in for position.
pub fn initial_standings(roster: &[Driver], grid: &BTreeMap<u32, u32>) -> Vec<DriverStanding> {
    roster
        .iter()
        .zip(1u32..)
        .map(|(driver, position)| DriverStanding {
            driver: driver.clone(),
            position,
            grid_position: grid.get(&driver.driver_number).copied().unwrap_or(position),
            pos_change: 0,
            gap: "-".to_string(),
            interval: "-".to_string(),
            aero_status: AeroMode::ZMode,
            mom_status: MomStatus::Unavailable,
            tyre: None,
        })
        .collect()
}

/// Current compound and pit count per driver from the stint list
pub fn current_tyres(stints: &[Stint]) -> BTreeMap<u32, TyreInfo> {
    let mut latest: BTreeMap<u32, &Stint> = BTreeMap::new();
    for stint in stints {
        let newer = latest
            .get(&stint.driver_number)
            .map_or(true, |s| stint.stint_number > s.stint_number);
        if newer {
            latest.insert(stint.driver_number, stint);
        }
    }

    latest
        .into_iter()
        .filter_map(|(driver, stint)| {
            let compound = stint.compound.clone()?;
            Some((
                driver,
                TyreInfo {
                    compound,
                    pit_count: stint.stint_number.saturating_sub(1),
                },
            ))
        })
        .collect()
}

/// A zero reading is treated as absent
fn format_seconds(value: Option<&GapValue>) -> Option<String> {
    match value? {
        GapValue::Seconds(s) if *s != 0.0 => Some(format!("+{:.3}", s)),
        GapValue::Seconds(_) => None,
        GapValue::Text(t) if t.is_empty() => None,
        GapValue::Text(t) => Some(t.clone()),
    }
}

fn format_gap(gap: Option<&GapValue>, position: u32) -> String {
    format_seconds(gap).unwrap_or_else(|| {
        if position == 1 {
            "LEADER".to_string()
        } else {
            "-".to_string()
        }
    })
}

fn format_interval(interval: Option<&GapValue>) -> String {
    format_seconds(interval).unwrap_or_else(|| "-".to_string())
}
