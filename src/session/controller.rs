//! Session lifecycle controller

use super::retry::{AcquireRetry, RetryDecision};
use super::roster::{load_grid, load_roster};
use super::selection::{Selection, SessionSelector};
use crate::config::SessionConfig;
use crate::error::SyncError;
use crate::feed::{Driver, Session, TimingFeed};
use crate::telemetry::{increment, record_latency, CounterMetric, LatencyMetric};
use chrono::{DateTime, Datelike, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Result of one successful acquisition
#[derive(Debug, Clone, PartialEq)]
pub struct Acquired {
    pub selection: Selection,
    /// Most recent finished race, looked up in the prior year when the
    /// current season has none yet
    pub last_race: Option<Session>,
}

/// Everything a live session needs before polling starts
#[derive(Debug, Clone)]
pub struct LiveContext {
    pub session: Session,
    pub roster: Vec<Driver>,
    /// Starting grid; empty for non-race sessions
    pub grid: BTreeMap<u32, u32>,
    /// Initial watermark for every incremental stream
    pub origin: DateTime<Utc>,
    /// Polling stops once this passes
    pub live_until: DateTime<Utc>,
}

/// Initial watermark: just before the latest known message, or a fixed
/// look-back from `now` when there is none
pub fn sync_origin(
    latest_message: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    lead: Duration,
    fallback: Duration,
) -> DateTime<Utc> {
    match latest_message {
        Some(latest) => latest - lead,
        None => now - fallback,
    }
}

/// Acquires, probes and initializes sessions against a timing feed
pub struct SessionController<F: TimingFeed + ?Sized> {
    feed: Arc<F>,
    config: SessionConfig,
    selector: SessionSelector,
}

impl<F: TimingFeed + ?Sized> SessionController<F> {
    pub fn new(feed: Arc<F>, config: SessionConfig) -> Self {
        let selector = SessionSelector::new(config.live_window());
        Self {
            feed,
            config,
            selector,
        }
    }

    pub fn feed(&self) -> &Arc<F> {
        &self.feed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// List sessions for the year of `now`, falling back to the prior year
    /// when the current one has nothing yet
    pub async fn list_sessions_at(&self, now: DateTime<Utc>) -> anyhow::Result<Vec<Session>> {
        let year = now.year();
        let sessions = self.feed.sessions(year).await?;
        if !sessions.is_empty() {
            return Ok(sessions);
        }

        tracing::info!(year, "No sessions listed, trying prior year");
        let sessions = self.feed.sessions(year - 1).await?;
        if sessions.is_empty() {
            return Err(SyncError::NoSessions { year }.into());
        }
        Ok(sessions)
    }

    fn select_at(&self, sessions: &[Session], now: DateTime<Utc>) -> anyhow::Result<Selection> {
        let selection = self
            .selector
            .select_at(sessions, now)
            .ok_or(SyncError::NoSessions { year: now.year() })?;
        Ok(selection)
    }

    /// One acquisition attempt at `now`
    pub async fn acquire_once_at(&self, now: DateTime<Utc>) -> anyhow::Result<Acquired> {
        let sessions = self.list_sessions_at(now).await?;
        let selection = self.select_at(&sessions, now)?;
        let last_race = match self.selector.last_completed_race(&sessions, now) {
            Some(race) => Some(race),
            None => self.prior_year_race(&sessions, now).await,
        };

        Ok(Acquired {
            selection,
            last_race,
        })
    }

    /// Last finished race of the previous season, unless `sessions` already
    /// is that season
    async fn prior_year_race(&self, sessions: &[Session], now: DateTime<Utc>) -> Option<Session> {
        let year = now.year();
        if sessions.iter().all(|s| s.year < year) {
            return None;
        }

        match self.feed.sessions(year - 1).await {
            Ok(prior) => self.selector.last_completed_race(&prior, now),
            Err(e) => {
                tracing::warn!(error = %e, year = year - 1, "Prior season listing failed");
                None
            }
        }
    }

    /// Acquire a session, retrying at a fixed interval up to the configured
    /// number of additional attempts
    ///
    /// `on_failure` is called with the failure count after each failed attempt.
    pub async fn acquire_with(
        &self,
        mut on_failure: impl FnMut(u32) + Send,
    ) -> Result<Acquired, SyncError> {
        let mut retry =
            AcquireRetry::new(self.config.acquire_max_retries, self.config.acquire_retry_delay());

        loop {
            let started = Instant::now();
            let result = self.acquire_once_at(Utc::now()).await;
            record_latency(LatencyMetric::SessionAcquire, started.elapsed());

            let err = match result {
                Ok(acquired) => {
                    let session = acquired.selection.session();
                    tracing::info!(
                        session_key = session.session_key,
                        session_name = %session.session_name,
                        circuit = %session.circuit_short_name,
                        phase = ?acquired.selection.phase(),
                        "Session acquired"
                    );
                    return Ok(acquired);
                }
                Err(e) => e,
            };

            increment(CounterMetric::AcquireFailure, None);
            let decision = retry.record_failure();
            on_failure(retry.failures());

            match decision {
                RetryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        error = %err,
                        attempt = retry.failures(),
                        retry_in_secs = delay.as_secs(),
                        "Session acquisition failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp { attempts } => {
                    tracing::error!(error = %err, attempts, "Session acquisition failed, giving up");
                    return Err(SyncError::ConnectionLost { attempts });
                }
            }
        }
    }

    pub async fn acquire(&self) -> Result<Acquired, SyncError> {
        self.acquire_with(|_| {}).await
    }

    /// Re-run selection and report `session` once it has gone live
    ///
    /// A different session becoming live is ignored; only the one being
    /// waited on counts.
    pub async fn probe_live_at(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Session>> {
        let sessions = self.list_sessions_at(now).await?;
        match self.select_at(&sessions, now)? {
            Selection::Live(live) if live.session_key == session.session_key => Ok(Some(live)),
            _ => Ok(None),
        }
    }

    pub async fn probe_live(&self, session: &Session) -> anyhow::Result<Option<Session>> {
        self.probe_live_at(session, Utc::now()).await
    }

    /// Load roster, starting grid and initial watermark for a live session
    ///
    /// Fetch failures here degrade to empty data rather than blocking the
    /// transition to live polling.
    pub async fn initialize_live_at(&self, session: Session, now: DateTime<Utc>) -> LiveContext {
        let key = session.session_key;

        let roster = load_roster(self.feed.as_ref(), &session).await;

        let grid = if session.is_race() {
            load_grid(self.feed.as_ref(), key).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, session_key = key, "Grid fetch failed");
                BTreeMap::new()
            })
        } else {
            BTreeMap::new()
        };

        let latest_message = match self.feed.race_control(key).await {
            Ok(log) => log
                .iter()
                .filter(|m| m.session_key == key)
                .map(|m| m.date)
                .max(),
            Err(e) => {
                tracing::warn!(error = %e, session_key = key, "Time sync fetch failed");
                None
            }
        };

        let origin = sync_origin(
            latest_message,
            now,
            self.config.sync_lead(),
            self.config.sync_fallback(),
        );

        tracing::info!(
            session_key = key,
            drivers = roster.len(),
            grid = grid.len(),
            origin = %origin,
            "Live session initialized"
        );

        LiveContext {
            live_until: self.selector.live_until(&session),
            session,
            roster,
            grid,
            origin,
        }
    }

    pub async fn initialize_live(&self, session: Session) -> LiveContext {
        self.initialize_live_at(session, Utc::now()).await
    }
}
