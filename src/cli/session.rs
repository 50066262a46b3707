//! Session command implementation

use crate::config::Config;
use crate::feed::{OpenF1Client, OpenF1Config, Session};
use crate::session::SessionController;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Print the selection as JSON
    #[arg(long)]
    pub json: bool,
}

impl SessionArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = OpenF1Client::with_config(OpenF1Config::from(&config.api))?;
        let controller = SessionController::new(Arc::new(client), config.session.clone());

        let acquired = controller.acquire_once_at(Utc::now()).await?;
        let phase = acquired.selection.phase();
        let session = acquired.selection.session();

        if self.json {
            let out = serde_json::json!({
                "phase": phase,
                "session": session,
                "last_race": acquired.last_race,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            return Ok(());
        }

        println!("Phase: {:?}", phase);
        print_session("Session", session);
        if let Some(race) = &acquired.last_race {
            print_session("Last race", race);
        }

        Ok(())
    }
}

fn print_session(label: &str, session: &Session) {
    println!(
        "{}: {} {} ({}, {}) key={}",
        label,
        session.year,
        session.session_name,
        session.circuit_short_name,
        session.country_name,
        session.session_key
    );
    println!("  Starts: {}", session.date_start);
    if let Some(end) = session.date_end {
        println!("  Ends:   {}", end);
    }
}
