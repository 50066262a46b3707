//! Roster and starting-grid loading

use crate::feed::{normalize_team_name, Driver, Position, Session, TimingFeed};
use std::collections::{BTreeMap, HashMap};

/// Fewer session drivers than this triggers the meeting-wide fallback
pub const MIN_SESSION_ROSTER: usize = 10;

/// Load the roster for `session`
///
/// Session-scoped listings are often incomplete early on; below
/// [`MIN_SESSION_ROSTER`] entries the meeting-wide listing is used instead,
/// one entry per driver number (latest entry wins, first-seen order kept).
/// A failed session listing counts as empty, so the meeting listing still
/// gets a chance.
pub async fn load_roster<F>(feed: &F, session: &Session) -> Vec<Driver>
where
    F: TimingFeed + ?Sized,
{
    let mut roster = feed
        .drivers(session.session_key)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                session_key = session.session_key,
                "Session roster fetch failed"
            );
            Vec::new()
        });

    if roster.len() < MIN_SESSION_ROSTER {
        match feed.meeting_drivers(session.meeting_key).await {
            Ok(meeting) if meeting.len() > roster.len() => {
                tracing::info!(
                    session_key = session.session_key,
                    meeting_key = session.meeting_key,
                    session_drivers = roster.len(),
                    meeting_drivers = meeting.len(),
                    "Session roster incomplete, using meeting roster"
                );
                roster = dedup_by_number(meeting);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    meeting_key = session.meeting_key,
                    "Meeting roster fetch failed"
                );
            }
        }
    }

    for driver in &mut roster {
        driver.team_name = normalize_team_name(&driver.team_name);
    }

    roster
}

fn dedup_by_number(drivers: Vec<Driver>) -> Vec<Driver> {
    let mut index: HashMap<u32, usize> = HashMap::new();
    let mut unique: Vec<Driver> = Vec::with_capacity(drivers.len());

    for driver in drivers {
        match index.get(&driver.driver_number) {
            Some(&i) => unique[i] = driver,
            None => {
                index.insert(driver.driver_number, unique.len());
                unique.push(driver);
            }
        }
    }

    unique
}

/// Starting grid as driver number to first recorded position
pub fn grid_from_positions(positions: &[Position]) -> BTreeMap<u32, u32> {
    let mut earliest: BTreeMap<u32, &Position> = BTreeMap::new();

    for p in positions {
        earliest
            .entry(p.driver_number)
            .and_modify(|current| {
                if p.date < current.date {
                    *current = p;
                }
            })
            .or_insert(p);
    }

    earliest
        .into_iter()
        .map(|(number, p)| (number, p.position))
        .collect()
}

/// Fetch the full position history and derive the starting grid
pub async fn load_grid<F>(feed: &F, session_key: u32) -> anyhow::Result<BTreeMap<u32, u32>>
where
    F: TimingFeed + ?Sized,
{
    let positions = feed.positions(session_key, None).await?;
    let positions: Vec<Position> = positions
        .into_iter()
        .filter(|p| p.session_key == session_key)
        .collect();
    Ok(grid_from_positions(&positions))
}
