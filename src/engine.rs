//! Engine
//!
//! Ties the session lifecycle to the polling orchestrator: acquire a
//! session, wait for it to go live if it has not started, initialize it
//! once, then poll until shutdown.

use crate::config::{Config, PollingConfig, StandingsConfig};
use crate::error::SyncError;
use crate::feed::{RaceControlMessage, Session, TimingFeed};
use crate::orchestrator::{PollExit, PollingOrchestrator, Snapshot, SnapshotSink};
use crate::session::{Selection, SessionController, SessionPhase};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Notification fan-out buffer; slow subscribers skip ahead past this
const NOTIFICATION_CAPACITY: usize = 64;

/// Lifecycle status, published on every transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub phase: SessionPhase,
    pub session: Option<Session>,
    pub last_race: Option<Session>,
    /// Failed acquisition attempts so far
    pub failed_attempts: u32,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Acquiring,
            session: None,
            last_race: None,
            failed_attempts: 0,
        }
    }
}

/// Live timing engine for a single process
pub struct Engine<F: TimingFeed + ?Sized + 'static> {
    controller: SessionController<F>,
    polling: PollingConfig,
    standings: StandingsConfig,
    status: watch::Sender<EngineStatus>,
    sink: SnapshotSink,
}

impl<F: TimingFeed + ?Sized + 'static> Engine<F> {
    pub fn new(feed: Arc<F>, config: &Config) -> Self {
        let (status, _) = watch::channel(EngineStatus::default());
        let (snapshots, _) = watch::channel(None);
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Self {
            controller: SessionController::new(feed, config.session.clone()),
            polling: config.polling.clone(),
            standings: config.standings,
            status,
            sink: SnapshotSink::new(snapshots, notifications),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<EngineStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<Option<Snapshot>> {
        self.sink.subscribe_snapshots()
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<RaceControlMessage> {
        self.sink.subscribe_notifications()
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.status.send_modify(|s| s.phase = phase);
        tracing::info!(phase = ?phase, "Lifecycle phase");
    }

    /// Run until shutdown, or until acquisition gives up
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), SyncError> {
        self.set_phase(SessionPhase::Acquiring);

        let acquired = tokio::select! {
            result = self.controller.acquire_with(|failures| {
                self.status.send_modify(|s| s.failed_attempts = failures);
            }) => result,
            _ = shutdown_requested(&mut shutdown) => return Ok(()),
        };

        let acquired = match acquired {
            Ok(acquired) => acquired,
            Err(e) => {
                self.set_phase(SessionPhase::ConnectionError);
                return Err(e);
            }
        };

        self.status.send_modify(|s| {
            s.session = Some(acquired.selection.session().clone());
            s.last_race = acquired.last_race.clone();
        });

        match acquired.selection {
            Selection::Live(session) => self.go_live(session, shutdown).await,
            Selection::Upcoming(session) => {
                self.set_phase(SessionPhase::Upcoming);
                if let Some(live) = self.await_live(&session, &mut shutdown).await {
                    self.go_live(live, shutdown).await;
                }
            }
            Selection::Completed(_) => {
                self.set_phase(SessionPhase::CompletedFallback);
                shutdown_requested(&mut shutdown).await;
            }
        }

        Ok(())
    }

    /// Probe until `session` goes live; `None` on shutdown
    async fn await_live(
        &self,
        session: &Session,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Session> {
        let period = self.controller.config().probe_interval();
        let mut probe = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        tracing::info!(
            session_key = session.session_key,
            starts = %session.date_start,
            probe_secs = period.as_secs(),
            "Waiting for session to go live"
        );

        loop {
            tokio::select! {
                _ = probe.tick() => {}
                _ = shutdown_requested(shutdown) => return None,
            }

            match self.controller.probe_live(session).await {
                Ok(Some(live)) => return Some(live),
                Ok(None) => {
                    tracing::debug!(session_key = session.session_key, "Session not live yet");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Live probe failed");
                }
            }
        }
    }

    async fn go_live(&self, session: Session, mut shutdown: watch::Receiver<bool>) {
        self.status.send_modify(|s| {
            s.phase = SessionPhase::Live;
            s.session = Some(session.clone());
        });
        tracing::info!(
            session_key = session.session_key,
            session_name = %session.session_name,
            "Session live"
        );

        let context = tokio::select! {
            context = self.controller.initialize_live(session) => context,
            _ = shutdown_requested(&mut shutdown) => return,
        };

        let orchestrator = PollingOrchestrator::new(
            Arc::clone(self.controller.feed()),
            context,
            self.polling.clone(),
            self.standings,
            self.sink.clone(),
        );
        if orchestrator.run(shutdown.clone()).await == PollExit::SessionEnded {
            self.set_phase(SessionPhase::CompletedFallback);
            shutdown_requested(&mut shutdown).await;
        }
    }

    /// Spawn onto the current runtime
    pub fn spawn(self) -> EngineHandle {
        let (shutdown, rx) = watch::channel(false);
        let status = self.subscribe_status();
        let snapshots = self.subscribe_snapshots();
        let notifications = self.subscribe_notifications();
        let task = tokio::spawn(self.run(rx));

        EngineHandle {
            status,
            snapshots,
            notifications,
            shutdown,
            task,
        }
    }
}

/// Resolves once shutdown is requested or its sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Running engine
pub struct EngineHandle {
    pub status: watch::Receiver<EngineStatus>,
    pub snapshots: watch::Receiver<Option<Snapshot>>,
    pub notifications: broadcast::Receiver<RaceControlMessage>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Result<(), SyncError>>,
}

impl EngineHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the engine and wait for it; in-flight fetches are abandoned
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        self.task.await??;
        Ok(())
    }

    /// Wait for the engine to stop on its own
    pub async fn join(self) -> anyhow::Result<()> {
        self.task.await??;
        Ok(())
    }
}
