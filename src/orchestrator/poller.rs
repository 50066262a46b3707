//! Polling orchestrator
//!
//! Each tick fetches every stream, then applies whatever arrived in one
//! synchronous step. A stream that fails leaves its prior state untouched;
//! a tick where everything fails publishes nothing.

use super::snapshot::{map_positions, Snapshot, SnapshotSink};
use crate::config::{PollingConfig, StandingsConfig};
use crate::error::SyncError;
use crate::feed::{
    CarData, Driver, Interval, Lap, Location, Position, RaceControlMessage, Session, Stint,
    TimingFeed, WeatherSample,
};
use crate::session::LiveContext;
use crate::standings::{
    current_tyres, initial_standings, StandingsEngine, StandingsInputs, TyreInfo,
};
use crate::sync::{LatestByKey, Stream, WatermarkCursor};
use crate::telemetry::{
    increment, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use crate::track_status::TrackStatusMonitor;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Raw results of one fetch phase; `None` marks a failed stream
#[derive(Debug)]
struct TickFetch {
    locations: Option<Vec<Location>>,
    race_control: Option<Vec<RaceControlMessage>>,
    positions: Option<Vec<Position>>,
    intervals: Option<Vec<Interval>>,
    telemetry: Option<Vec<CarData>>,
    weather: Option<Vec<WeatherSample>>,
    /// Also `None` when there is no leader to ask about
    laps: Option<Vec<Lap>>,
    stints: Option<Vec<Stint>>,
    failed: usize,
}

impl TickFetch {
    fn all_failed(&self) -> bool {
        self.locations.is_none()
            && self.race_control.is_none()
            && self.positions.is_none()
            && self.intervals.is_none()
            && self.telemetry.is_none()
            && self.weather.is_none()
            && self.laps.is_none()
            && self.stints.is_none()
    }
}

/// Why a polling loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollExit {
    Shutdown,
    /// The session's live window closed
    SessionEnded,
}

/// Outcome of a successful tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sequence: u64,
    pub failed_streams: usize,
    pub notification: Option<RaceControlMessage>,
}

fn keep<T>(
    stream: &'static str,
    session_key: u32,
    result: anyhow::Result<Vec<T>>,
    failed: &mut usize,
) -> Option<Vec<T>> {
    match result {
        Ok(records) => Some(records),
        Err(e) => {
            tracing::warn!(error = %e, stream, session_key, "Stream fetch failed");
            increment(CounterMetric::FetchFailure, Some(stream));
            *failed += 1;
            None
        }
    }
}

/// Polls every stream for one live session and publishes snapshots
pub struct PollingOrchestrator<F: TimingFeed + ?Sized> {
    feed: Arc<F>,
    session: Session,
    live_until: DateTime<Utc>,
    roster: Vec<Driver>,
    grid: BTreeMap<u32, u32>,
    polling: PollingConfig,
    watermarks: WatermarkCursor,
    positions: LatestByKey<Position>,
    intervals: LatestByKey<Interval>,
    locations: LatestByKey<Location>,
    telemetry: LatestByKey<CarData>,
    tyres: BTreeMap<u32, TyreInfo>,
    track: TrackStatusMonitor,
    standings: StandingsEngine,
    snapshot: Snapshot,
    sink: SnapshotSink,
}

impl<F: TimingFeed + ?Sized> PollingOrchestrator<F> {
    /// Create an orchestrator seeded with roster-order standings
    pub fn new(
        feed: Arc<F>,
        context: LiveContext,
        polling: PollingConfig,
        standings: StandingsConfig,
        sink: SnapshotSink,
    ) -> Self {
        let LiveContext {
            session,
            roster,
            grid,
            origin,
            live_until,
        } = context;
        let seed = Snapshot::seed(session.session_key, initial_standings(&roster, &grid));

        Self {
            feed,
            session,
            live_until,
            roster,
            grid,
            polling,
            watermarks: WatermarkCursor::new(origin),
            positions: LatestByKey::new(),
            intervals: LatestByKey::new(),
            locations: LatestByKey::new(),
            telemetry: LatestByKey::new(),
            tyres: BTreeMap::new(),
            track: TrackStatusMonitor::new(),
            standings: StandingsEngine::new(standings),
            snapshot: seed,
            sink,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Last published (or seed) snapshot
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn watermarks(&self) -> &WatermarkCursor {
        &self.watermarks
    }

    /// Run one tick at `now`
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickReport, SyncError> {
        let fetch = self.fetch(now).await;

        if fetch.all_failed() {
            return Err(SyncError::TickFailed {
                session_key: self.session.session_key,
            });
        }

        Ok(self.apply(fetch))
    }

    pub async fn tick(&mut self) -> Result<TickReport, SyncError> {
        self.tick_at(Utc::now()).await
    }

    async fn fetch(&self, now: DateTime<Utc>) -> TickFetch {
        let feed = self.feed.as_ref();
        let key = self.session.session_key;
        let mut failed = 0;

        // Locations and race control first; the rest concurrently
        let locations = keep(
            "locations",
            key,
            feed.locations(key, self.watermarks.get(Stream::Locations)).await,
            &mut failed,
        );
        let race_control = keep(
            "race_control",
            key,
            feed.race_control(key).await,
            &mut failed,
        );

        let leader = self.snapshot.leader().map(|s| s.driver_number());
        let telemetry_since = now - self.polling.telemetry_window();

        let (positions, intervals, telemetry, weather, laps, stints) = tokio::join!(
            feed.positions(key, Some(self.watermarks.get(Stream::Positions))),
            feed.intervals(key),
            feed.car_data(key, telemetry_since),
            feed.weather(key, Some(self.watermarks.get(Stream::Weather))),
            async {
                match leader {
                    Some(driver) => Some(feed.laps(key, driver).await),
                    None => None,
                }
            },
            feed.stints(key),
        );

        TickFetch {
            locations,
            race_control,
            positions: keep("positions", key, positions, &mut failed),
            intervals: keep("intervals", key, intervals, &mut failed),
            telemetry: keep("car_data", key, telemetry, &mut failed),
            weather: keep("weather", key, weather, &mut failed),
            laps: laps.and_then(|r| keep("laps", key, r, &mut failed)),
            stints: keep("stints", key, stints, &mut failed),
            failed,
        }
    }

    /// Apply fetched records and publish a new snapshot
    fn apply(&mut self, fetch: TickFetch) -> TickReport {
        let key = self.session.session_key;
        let mut snapshot = self.snapshot.clone();

        if let Some(batch) = fetch.locations {
            let outcome = self.locations.merge(only_session(batch, key, |l| l.session_key));
            self.watermarks.advance(Stream::Locations, outcome.newest);
        }

        let mut notification = None;
        if let Some(log) = fetch.race_control {
            let log = only_session(log, key, |m| m.session_key);
            let observation = self.track.observe(&log);
            snapshot.track_status = observation.status;
            notification = observation.notification;
            if log.len() >= snapshot.race_control.len() {
                snapshot.race_control = log;
            }
        }

        if let Some(batch) = fetch.positions {
            let outcome = self.positions.merge(only_session(batch, key, |p| p.session_key));
            self.watermarks.advance(Stream::Positions, outcome.newest);
        }

        if let Some(batch) = fetch.intervals {
            self.intervals.merge(only_session(batch, key, |i| i.session_key));
        }

        // Telemetry is windowed: each successful fetch replaces the map
        if let Some(batch) = fetch.telemetry {
            self.telemetry = LatestByKey::from_batch(only_session(batch, key, |c| c.session_key));
        }

        if let Some(batch) = fetch.weather {
            let latest = only_session(batch, key, |w| w.session_key)
                .into_iter()
                .max_by_key(|w| w.date);
            if let Some(sample) = latest {
                self.watermarks.advance(Stream::Weather, Some(sample.date));
                snapshot.weather = Some(sample);
            }
        }

        if let Some(laps) = fetch.laps {
            let lap = only_session(laps, key, |l| l.session_key)
                .iter()
                .map(|l| l.lap_number + 1)
                .max()
                .unwrap_or(0);
            if lap > 0 {
                snapshot.current_lap = lap;
            }
        }

        if let Some(stints) = fetch.stints {
            self.tyres = current_tyres(&only_session(stints, key, |s| s.session_key));
        }

        snapshot.standings = self.standings.derive(&StandingsInputs {
            roster: &self.roster,
            positions: &self.positions,
            intervals: &self.intervals,
            telemetry: &self.telemetry,
            grid: &self.grid,
            tyres: &self.tyres,
            previous: &self.snapshot.standings,
        });
        snapshot.driver_map_positions = map_positions(&self.roster, &self.locations);
        snapshot.sequence += 1;

        self.publish(snapshot);
        if let Some(message) = &notification {
            tracing::info!(
                session_key = key,
                message = %message.message,
                status = %self.snapshot.track_status,
                "Race control"
            );
            self.sink.notify(message.clone());
        }

        TickReport {
            sequence: self.snapshot.sequence,
            failed_streams: fetch.failed,
            notification,
        }
    }

    fn publish(&mut self, snapshot: Snapshot) {
        let ranked = snapshot.standings.iter().filter(|s| s.is_ranked()).count();
        set_gauge(GaugeMetric::RankedDrivers, ranked as f64);
        set_gauge(
            GaugeMetric::RaceControlMessages,
            snapshot.race_control.len() as f64,
        );
        set_gauge(GaugeMetric::CurrentLap, f64::from(snapshot.current_lap));
        increment(CounterMetric::SnapshotPublished, None);

        self.snapshot = snapshot;
        self.sink.publish(self.snapshot.clone());
    }

    /// Publish the seed snapshot, then tick at the polling interval until
    /// `shutdown` flips, its sender goes away, or the session's live window
    /// closes
    ///
    /// A tick in flight when shutdown arrives is dropped before any of its
    /// results are applied.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PollExit {
        let seed = self.snapshot.clone();
        self.publish(seed);

        let mut interval = tokio::time::interval(self.polling.interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            session_key = self.session.session_key,
            interval_ms = self.polling.interval_ms,
            drivers = self.roster.len(),
            "Polling started"
        );

        let exit = loop {
            if *shutdown.borrow() {
                break PollExit::Shutdown;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break PollExit::Shutdown;
                    }
                    continue;
                }
                _ = interval.tick() => {}
            }

            if Utc::now() > self.live_until {
                tracing::info!(
                    session_key = self.session.session_key,
                    live_until = %self.live_until,
                    "Session no longer live"
                );
                break PollExit::SessionEnded;
            }

            let started = Instant::now();
            let result = tokio::select! {
                result = self.tick() => result,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break PollExit::Shutdown;
                    }
                    continue;
                }
            };
            record_latency(LatencyMetric::PollTick, started.elapsed());

            match result {
                Ok(report) => {
                    tracing::debug!(
                        session_key = self.session.session_key,
                        sequence = report.sequence,
                        failed_streams = report.failed_streams,
                        "Tick complete"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Tick skipped, keeping last snapshot");
                }
            }
        };

        tracing::info!(session_key = self.session.session_key, exit = ?exit, "Polling stopped");
        exit
    }
}

fn only_session<T>(records: Vec<T>, session_key: u32, key_of: impl Fn(&T) -> u32) -> Vec<T> {
    let total = records.len();
    let kept: Vec<T> = records
        .into_iter()
        .filter(|r| key_of(r) == session_key)
        .collect();
    if kept.len() < total {
        tracing::debug!(
            session_key,
            dropped = total - kept.len(),
            "Dropped records from another session"
        );
    }
    kept
}
