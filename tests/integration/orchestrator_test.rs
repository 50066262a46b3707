//! Integration tests for the polling orchestrator

use crate::common::*;
use chrono::Utc;
use pitlane::config::{PollingConfig, StandingsConfig};
use pitlane::orchestrator::{PollExit, PollingOrchestrator, SnapshotSink};
use pitlane::session::LiveContext;
use pitlane::standings::{AeroMode, MomStatus};
use pitlane::sync::Stream;
use pitlane::track_status::TrackStatus;
use pitlane::SyncError;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn race_session() -> pitlane::feed::Session {
    session(SESSION_KEY, "Race", at(-600), None)
}

fn roster() -> Vec<pitlane::feed::Driver> {
    vec![
        driver(1, "VER", "Red Bull Racing"),
        driver(16, "LEC", "Ferrari"),
        driver(44, "HAM", "Mercedes"),
    ]
}

/// Feed with one tick's worth of data for a three-car race
fn scripted_feed() -> Arc<FakeFeed> {
    let feed = Arc::new(FakeFeed::new());
    feed.with(|s| {
        s.positions = vec![position(1, 1, at(10)), position(16, 2, at(10)), position(44, 3, at(11))];
        s.intervals = vec![
            interval(1, Some(0.0), Some(0.0), at(10)),
            interval(16, Some(0.812), Some(0.812), at(10)),
            interval(44, Some(3.25), Some(2.438), at(10)),
        ];
        s.locations = vec![location(1, 100.0, 200.0, at(9)), location(16, 90.0, 210.0, at(9))];
        s.car_data = vec![car(1, 12, at(29)), car(16, 8, at(29))];
        s.race_control = vec![message("GREEN LIGHT - PIT EXIT OPEN", at(1))];
        s.weather = vec![weather(24.0, at(5)), weather(25.5, at(8))];
        s.laps = vec![lap(1, 1), lap(1, 2), lap(1, 3)];
        s.stints = vec![stint(1, 1, "MEDIUM"), stint(16, 1, "MEDIUM"), stint(16, 2, "HARD")];
    });
    feed
}

fn context(grid: BTreeMap<u32, u32>) -> LiveContext {
    LiveContext {
        session: race_session(),
        roster: roster(),
        grid,
        origin: at(0),
        live_until: Utc::now() + chrono::Duration::hours(4),
    }
}

fn orchestrator(feed: Arc<FakeFeed>, grid: BTreeMap<u32, u32>) -> (PollingOrchestrator<FakeFeed>, SnapshotSink) {
    let (sink, _rx) = SnapshotSink::channel(16);
    let orchestrator = PollingOrchestrator::new(
        feed,
        context(grid),
        PollingConfig::default(),
        StandingsConfig::default(),
        sink.clone(),
    );
    (orchestrator, sink)
}

#[tokio::test]
async fn test_tick_publishes_derived_snapshot() {
    let feed = scripted_feed();
    let grid = BTreeMap::from([(1, 2), (16, 1), (44, 3)]);
    let (mut orch, sink) = orchestrator(feed, grid);
    let rx = sink.subscribe_snapshots();

    let report = orch.tick_at(at(30)).await.unwrap();
    assert_eq!(report.sequence, 1);
    assert_eq!(report.failed_streams, 0);

    let snapshot = rx.borrow().clone().unwrap();
    assert_eq!(snapshot.session_key, SESSION_KEY);
    assert_eq!(snapshot.track_status, TrackStatus::Green);
    assert_eq!(snapshot.current_lap, 4);
    assert_eq!(snapshot.weather.as_ref().map(|w| w.air_temperature), Some(25.5));

    let order: Vec<u32> = snapshot.standings.iter().map(|s| s.driver_number()).collect();
    assert_eq!(order, vec![1, 16, 44]);

    let leader = &snapshot.standings[0];
    assert_eq!(leader.gap, "LEADER");
    assert_eq!(leader.interval, "-");
    assert_eq!(leader.pos_change, 1);
    assert_eq!(leader.aero_status, AeroMode::XMode);
    assert_eq!(leader.mom_status, MomStatus::Unavailable);

    let second = &snapshot.standings[1];
    assert_eq!(second.gap, "+0.812");
    assert_eq!(second.pos_change, -1);
    assert_eq!(second.aero_status, AeroMode::ZMode);
    assert_eq!(second.mom_status, MomStatus::Ready);
    assert_eq!(second.tyre.as_ref().map(|t| t.compound.as_str()), Some("HARD"));
    assert_eq!(second.tyre.as_ref().map(|t| t.pit_count), Some(1));

    assert_eq!(snapshot.standings[2].mom_status, MomStatus::Unavailable);
    assert_eq!(snapshot.driver_map_positions.len(), 2);
    assert_eq!(snapshot.race_control.len(), 1);
    assert_eq!(&snapshot, orch.snapshot());
}

#[tokio::test]
async fn test_watermarks_advance_to_newest_record() {
    let feed = scripted_feed();
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());

    orch.tick_at(at(30)).await.unwrap();
    assert_eq!(orch.watermarks().get(Stream::Positions), at(11));
    assert_eq!(orch.watermarks().get(Stream::Locations), at(9));
    assert_eq!(orch.watermarks().get(Stream::Weather), at(8));

    orch.tick_at(at(32)).await.unwrap();
    assert_eq!(feed.last_since("positions"), Some(at(11)));
    assert_eq!(feed.last_since("locations"), Some(at(9)));
    assert_eq!(feed.last_since("weather"), Some(at(8)));
    assert_eq!(feed.last_since("car_data"), Some(at(29)));
}

#[tokio::test]
async fn test_all_streams_failing_publishes_nothing() {
    let feed = scripted_feed();
    let (mut orch, sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    let rx = sink.subscribe_snapshots();

    orch.tick_at(at(30)).await.unwrap();
    let before = orch.snapshot().clone();
    let marks_before = orch.watermarks().clone();

    feed.fail_all();
    let err = orch.tick_at(at(32)).await.unwrap_err();
    assert!(matches!(err, SyncError::TickFailed { session_key: SESSION_KEY }));

    assert_eq!(orch.snapshot(), &before);
    assert_eq!(rx.borrow().as_ref(), Some(&before));
    assert_eq!(orch.watermarks(), &marks_before);
}

#[tokio::test]
async fn test_failed_stream_keeps_prior_state() {
    let feed = scripted_feed();
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();

    feed.fail(&["positions", "weather", "laps", "car_data"]);
    feed.with(|s| {
        s.race_control.push(message("SAFETY CAR DEPLOYED", at(31)));
    });

    let report = orch.tick_at(at(32)).await.unwrap();
    assert_eq!(report.failed_streams, 4);

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.track_status, TrackStatus::SafetyCar);
    assert_eq!(snapshot.current_lap, 4);
    assert_eq!(snapshot.weather.as_ref().map(|w| w.air_temperature), Some(25.5));
    assert_eq!(snapshot.standings[0].aero_status, AeroMode::XMode);
    let order: Vec<u32> = snapshot.standings.iter().map(|s| s.driver_number()).collect();
    assert_eq!(order, vec![1, 16, 44]);
}

#[tokio::test]
async fn test_empty_telemetry_window_resets_aero() {
    let feed = scripted_feed();
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();

    // No samples inside the window is a successful empty fetch
    orch.tick_at(at(60)).await.unwrap();
    assert_eq!(orch.snapshot().standings[0].aero_status, AeroMode::ZMode);
}

#[tokio::test]
async fn test_notification_once_per_message() {
    let feed = scripted_feed();
    let (mut orch, sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    let mut notes = sink.subscribe_notifications();

    let report = orch.tick_at(at(30)).await.unwrap();
    assert!(report.notification.is_some());
    orch.tick_at(at(32)).await.unwrap();
    orch.tick_at(at(34)).await.unwrap();

    assert_eq!(notes.try_recv().unwrap().message, "GREEN LIGHT - PIT EXIT OPEN");
    assert!(notes.try_recv().is_err());

    feed.with(|s| s.race_control.push(message("RED FLAG", at(35))));
    orch.tick_at(at(36)).await.unwrap();
    assert_eq!(notes.try_recv().unwrap().message, "RED FLAG");
    assert!(notes.try_recv().is_err());
    assert_eq!(orch.snapshot().track_status, TrackStatus::Red);
}

#[tokio::test]
async fn test_shorter_race_control_page_keeps_status() {
    let feed = scripted_feed();
    feed.with(|s| s.race_control.push(message("VIRTUAL SAFETY CAR DEPLOYED", at(20))));
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();
    assert_eq!(orch.snapshot().track_status, TrackStatus::VirtualSafetyCar);

    feed.with(|s| s.race_control.clear());
    let report = orch.tick_at(at(32)).await.unwrap();
    assert!(report.notification.is_none());
    assert_eq!(orch.snapshot().track_status, TrackStatus::VirtualSafetyCar);
    assert_eq!(orch.snapshot().race_control.len(), 2);
}

#[tokio::test]
async fn test_chequered_flag_latches() {
    let feed = scripted_feed();
    feed.with(|s| s.race_control.push(message("CHEQUERED FLAG", at(20))));
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();

    feed.with(|s| s.race_control.push(message("RED FLAG", at(31))));
    orch.tick_at(at(32)).await.unwrap();
    assert_eq!(orch.snapshot().track_status, TrackStatus::Chequered);
}

#[tokio::test]
async fn test_records_from_other_session_are_dropped() {
    let feed = scripted_feed();
    feed.with(|s| {
        let mut stale = position(44, 1, at(20));
        stale.session_key = SESSION_KEY - 1;
        s.positions.push(stale);

        let mut other = message("RED FLAG", at(25));
        other.session_key = SESSION_KEY - 1;
        s.race_control.push(other);
    });

    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.standings[0].driver_number(), 1);
    assert_eq!(snapshot.track_status, TrackStatus::Green);
    assert_eq!(snapshot.race_control.len(), 1);
    assert_eq!(orch.watermarks().get(Stream::Positions), at(11));
}

#[tokio::test]
async fn test_out_of_order_record_does_not_regress() {
    let feed = scripted_feed();
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());
    orch.tick_at(at(30)).await.unwrap();

    // A newer position for 44, then an older one arriving late
    feed.with(|s| {
        s.positions.push(position(44, 1, at(40)));
        s.positions.push(position(1, 3, at(41)));
    });
    orch.tick_at(at(42)).await.unwrap();

    feed.with(|s| s.positions.push(position(44, 3, at(39))));
    orch.tick_at(at(44)).await.unwrap();

    let order: Vec<u32> = orch
        .snapshot()
        .standings
        .iter()
        .map(|s| s.driver_number())
        .collect();
    assert_eq!(order, vec![44, 16, 1]);
}

#[tokio::test]
async fn test_seed_snapshot_before_first_tick() {
    let feed = scripted_feed();
    let (orch, _sink) = orchestrator(feed, BTreeMap::from([(44, 1)]));

    let snapshot = orch.snapshot();
    assert_eq!(snapshot.sequence, 0);
    let positions: Vec<(u32, u32)> = snapshot
        .standings
        .iter()
        .map(|s| (s.driver_number(), s.position))
        .collect();
    assert_eq!(positions, vec![(1, 1), (16, 2), (44, 3)]);
    assert_eq!(snapshot.standings[2].grid_position, 1);
}

#[tokio::test(start_paused = true)]
async fn test_independent_streams_fetched_concurrently() {
    let feed = scripted_feed();
    feed.with(|s| s.latency = Some(Duration::from_secs(1)));
    let (mut orch, _sink) = orchestrator(Arc::clone(&feed), BTreeMap::new());

    let started = tokio::time::Instant::now();
    orch.tick_at(at(30)).await.unwrap();

    // Locations, then race control, then the remaining six side by side
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    for stream in ["positions", "intervals", "car_data", "weather", "laps", "stints"] {
        assert_eq!(feed.calls(stream), 1, "{stream}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_polls_until_shutdown() {
    let feed = scripted_feed();
    let (sink, _rx) = SnapshotSink::channel(16);
    let polling = PollingConfig {
        interval_ms: 0,
        ..PollingConfig::default()
    };
    let orch = PollingOrchestrator::new(
        Arc::clone(&feed),
        context(BTreeMap::new()),
        polling,
        StandingsConfig::default(),
        sink,
    );

    let (tx, shutdown) = watch::channel(false);
    let task = tokio::spawn(orch.run(shutdown));
    tokio::time::sleep(Duration::from_millis(10)).await;
    tx.send(true).unwrap();

    assert_eq!(task.await.unwrap(), PollExit::Shutdown);
    assert!(feed.calls("intervals") > 0);
}

#[tokio::test]
async fn test_polling_stops_once_live_window_closes() {
    let feed = scripted_feed();
    let (sink, rx) = SnapshotSink::channel(16);
    let mut ended = context(BTreeMap::new());
    ended.live_until = Utc::now() - chrono::Duration::minutes(1);
    let orch = PollingOrchestrator::new(
        Arc::clone(&feed),
        ended,
        PollingConfig::default(),
        StandingsConfig::default(),
        sink,
    );

    let (_tx, shutdown) = watch::channel(false);
    assert_eq!(orch.run(shutdown).await, PollExit::SessionEnded);
    assert_eq!(feed.calls("intervals"), 0);
    assert_eq!(rx.borrow().as_ref().map(|s| s.sequence), Some(0));
}
