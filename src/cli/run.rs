//! Run command implementation

use crate::config::Config;
use crate::engine::Engine;
use crate::feed::{OpenF1Client, OpenF1Config};
use crate::orchestrator::Snapshot;
use crate::session::SessionPhase;
use clap::Args;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Print one JSON snapshot per line instead of a table
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = OpenF1Client::with_config(OpenF1Config::from(&config.api))?;
        let engine = Engine::new(Arc::new(client), config);
        let mut handle = engine.spawn();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupted, shutting down");
                    break;
                }
                changed = handle.status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = handle.status.borrow_and_update().clone();
                    if status.phase == SessionPhase::ConnectionError {
                        return handle.join().await;
                    }
                    if let Some(session) = &status.session {
                        eprintln!(
                            "[{:?}] {} {} (key {})",
                            status.phase,
                            session.circuit_short_name,
                            session.session_name,
                            session.session_key
                        );
                    }
                }
                changed = handle.snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = handle.snapshots.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        self.print_snapshot(&snapshot)?;
                    }
                }
                note = handle.notifications.recv() => match note {
                    Ok(message) => eprintln!("RACE CONTROL: {}", message.message),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Notification subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }

        handle.shutdown().await
    }

    fn print_snapshot(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(snapshot)?);
            return Ok(());
        }

        println!(
            "Lap {:>3}  {:<9}  #{}",
            snapshot.current_lap, snapshot.track_status, snapshot.sequence
        );
        for s in &snapshot.standings {
            let tyre = s.tyre.as_ref().map_or("-", |t| t.compound.as_str());
            println!(
                "  {:>2}  {:<3} {:>3}  {:>10}  {:>10}  {:+3}  {:<6}  {:<11}  {}",
                s.position,
                s.driver.name_acronym,
                s.driver_number(),
                s.gap,
                s.interval,
                s.pos_change,
                tyre,
                s.mom_status.as_str(),
                s.aero_status.as_str(),
            );
        }
        Ok(())
    }
}
