//! Integration tests for session lifecycle and the engine

use crate::common::*;
use chrono::{Datelike, Duration as ChronoDuration, TimeZone, Utc};
use pitlane::config::{Config, SessionConfig};
use pitlane::engine::Engine;
use pitlane::session::{Selection, SessionController, SessionPhase};
use pitlane::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn full_grid() -> Vec<pitlane::feed::Driver> {
    (1..=20)
        .map(|n| driver(n, &format!("D{n:02}"), "Scuderia Ferrari"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_gives_up_after_bounded_retries() {
    let feed = Arc::new(FakeFeed::new());
    feed.fail(&["sessions"]);

    let engine = Engine::new(Arc::clone(&feed), &Config::default());
    let status = engine.subscribe_status();
    let (_shutdown, rx) = watch::channel(false);

    let started = tokio::time::Instant::now();
    let err = engine.run(rx).await.unwrap_err();

    assert!(matches!(err, SyncError::ConnectionLost { attempts: 7 }));
    assert_eq!(feed.calls("sessions"), 7);
    assert_eq!(started.elapsed(), Duration::from_secs(30));
    assert_eq!(status.borrow().phase, SessionPhase::ConnectionError);
    assert_eq!(status.borrow().failed_attempts, 7);
}

#[tokio::test(start_paused = true)]
async fn test_acquisition_recovers_within_budget() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc::now();
    feed.with(|s| {
        s.sessions = vec![session(SESSION_KEY, "Race", now - ChronoDuration::minutes(10), None)];
        s.drivers = full_grid();
    });
    feed.fail(&["sessions"]);

    let handle = Engine::new(Arc::clone(&feed), &Config::default()).spawn();
    tokio::time::sleep(Duration::from_secs(7)).await;
    feed.heal();

    let mut status = handle.status.clone();
    let live = status
        .wait_for(|s| s.phase == SessionPhase::Live)
        .await
        .unwrap()
        .clone();
    assert_eq!(live.failed_attempts, 2);
    assert_eq!(live.session.map(|s| s.session_key), Some(SESSION_KEY));

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_upcoming_session_goes_live_once() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc::now();
    feed.with(|s| {
        s.sessions = vec![session(
            SESSION_KEY,
            "Race",
            now + ChronoDuration::hours(1),
            Some(now + ChronoDuration::hours(3)),
        )];
        s.drivers = full_grid();
    });

    let handle = Engine::new(Arc::clone(&feed), &Config::default()).spawn();
    let mut status = handle.status.clone();
    status
        .wait_for(|s| s.phase == SessionPhase::Upcoming)
        .await
        .unwrap();

    // Acquisition also read the prior season for a finished race; then two
    // probes at the 30 second interval, still not started
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(status.borrow().phase, SessionPhase::Upcoming);
    assert_eq!(feed.calls("drivers"), 0);
    let listings = feed.calls("sessions");
    assert_eq!(listings, 4);

    feed.with(|s| s.sessions[0].date_start = Utc::now() - ChronoDuration::minutes(1));
    status
        .wait_for(|s| s.phase == SessionPhase::Live)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(feed.calls("drivers"), 1);
    assert_eq!(feed.calls("sessions"), listings + 1);
    assert!(feed.calls("positions") > 10);

    let snapshot = handle.snapshots.borrow().clone().unwrap();
    assert_eq!(snapshot.session_key, SESSION_KEY);
    assert_eq!(snapshot.standings.len(), 20);
    assert!(snapshot.sequence > 10);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_completed_fallback_idles_until_shutdown() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc::now();
    let start = now - ChronoDuration::days(2);
    feed.with(|s| {
        s.sessions = vec![
            session(SESSION_KEY - 1, "Qualifying", start, Some(start + ChronoDuration::hours(1))),
            session(SESSION_KEY, "Race", start + ChronoDuration::days(1), Some(start + ChronoDuration::days(1) + ChronoDuration::hours(2))),
        ];
    });

    let handle = Engine::new(Arc::clone(&feed), &Config::default()).spawn();
    let mut status = handle.status.clone();
    let idle = status
        .wait_for(|s| s.phase == SessionPhase::CompletedFallback)
        .await
        .unwrap()
        .clone();
    assert_eq!(idle.session.map(|s| s.session_key), Some(SESSION_KEY));
    assert_eq!(idle.last_race.map(|s| s.session_key), Some(SESSION_KEY));

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(feed.calls("sessions"), 1);
    assert_eq!(feed.calls("drivers"), 0);
    assert!(handle.snapshots.borrow().is_none());

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_polling() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc::now();
    feed.with(|s| {
        s.sessions = vec![session(SESSION_KEY, "Race", now - ChronoDuration::minutes(30), None)];
        s.drivers = full_grid();
    });

    let handle = Engine::new(Arc::clone(&feed), &Config::default()).spawn();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(feed.calls("intervals") >= 5);

    handle.shutdown().await.unwrap();
    let polled = feed.calls("intervals");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(feed.calls("intervals"), polled);
}

#[tokio::test]
async fn test_empty_year_falls_back_to_prior_year() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc::now();
    let last_year = Utc
        .with_ymd_and_hms(now.year() - 1, 11, 30, 13, 0, 0)
        .unwrap();
    feed.with(|s| {
        s.sessions = vec![session(SESSION_KEY, "Race", last_year, Some(last_year + ChronoDuration::hours(2)))];
    });

    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());
    let acquired = controller.acquire_once_at(now).await.unwrap();

    assert!(matches!(acquired.selection, Selection::Completed(ref s) if s.session_key == SESSION_KEY));
    assert_eq!(feed.calls("sessions"), 2);
}

#[tokio::test]
async fn test_no_sessions_in_either_year_is_an_error() {
    let feed = Arc::new(FakeFeed::new());
    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());

    let err = controller.acquire_once_at(Utc::now()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::NoSessions { .. })
    ));
}

#[tokio::test]
async fn test_initialize_live_loads_roster_grid_and_origin() {
    let feed = Arc::new(FakeFeed::new());
    feed.with(|s| {
        s.drivers = vec![driver(1, "VER", "Oracle Red Bull Racing")];
        s.meeting_drivers = vec![
            driver(1, "VER", "Red Bull Racing"),
            driver(16, "LEC", "Scuderia Ferrari"),
            driver(1, "VER", "Oracle Red Bull Racing"),
            driver(20, "MAG", "MoneyGram Haas F1 Team"),
        ];
        s.positions = vec![
            position(16, 2, at(5)),
            position(1, 1, at(3)),
            position(16, 1, at(60)),
        ];
        s.race_control = vec![message("GREEN FLAG", at(100)), message("DRS ENABLED", at(400))];
    });

    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());
    let race = session(SESSION_KEY, "Race", at(0), None);
    let context = controller.initialize_live_at(race, at(600)).await;

    let numbers: Vec<u32> = context.roster.iter().map(|d| d.driver_number).collect();
    assert_eq!(numbers, vec![1, 16, 20]);
    assert_eq!(context.roster[0].team_name, "Red Bull Racing");
    assert_eq!(context.roster[1].team_name, "Ferrari");
    assert_eq!(context.roster[2].team_name, "Haas F1 Team");

    assert_eq!(context.grid.get(&16), Some(&2));
    assert_eq!(context.grid.get(&1), Some(&1));
    assert_eq!(context.origin, at(395));
    assert_eq!(context.live_until, at(0) + ChronoDuration::hours(4));
}

#[tokio::test]
async fn test_season_opener_reports_last_race_of_prior_year() {
    let feed = Arc::new(FakeFeed::new());
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    let opener = Utc.with_ymd_and_hms(2025, 3, 16, 4, 0, 0).unwrap();
    let finale = Utc.with_ymd_and_hms(2024, 12, 8, 13, 0, 0).unwrap();
    feed.with(|s| {
        s.sessions = vec![
            session(SESSION_KEY, "Race", opener, Some(opener + ChronoDuration::hours(2))),
            session(SESSION_KEY - 50, "Race", finale, Some(finale + ChronoDuration::hours(2))),
        ];
    });

    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());
    let acquired = controller.acquire_once_at(now).await.unwrap();

    assert!(matches!(acquired.selection, Selection::Upcoming(ref s) if s.session_key == SESSION_KEY));
    assert_eq!(acquired.last_race.map(|s| s.session_key), Some(SESSION_KEY - 50));
    assert_eq!(feed.calls("sessions"), 2);
}

#[tokio::test]
async fn test_failed_session_roster_falls_back_to_meeting() {
    let feed = Arc::new(FakeFeed::new());
    feed.with(|s| s.meeting_drivers = full_grid());
    feed.fail(&["drivers"]);

    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());
    let race = session(SESSION_KEY, "Race", at(0), None);
    let context = controller.initialize_live_at(race, at(600)).await;

    assert_eq!(context.roster.len(), 20);
    assert_eq!(context.roster[0].team_name, "Ferrari");
    assert_eq!(feed.calls("meeting_drivers"), 1);
}

#[tokio::test]
async fn test_initialize_live_degrades_on_failures() {
    let feed = Arc::new(FakeFeed::new());
    feed.fail(&["drivers", "race_control"]);

    let controller = SessionController::new(Arc::clone(&feed), SessionConfig::default());
    let practice = session(SESSION_KEY, "Practice 1", at(0), None);
    let context = controller.initialize_live_at(practice, at(600)).await;

    assert!(context.roster.is_empty());
    assert!(context.grid.is_empty());
    assert_eq!(feed.calls("positions"), 0);
    assert_eq!(context.origin, at(300));
}
