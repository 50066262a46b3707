//! CLI interface for pitlane
//!
//! Provides subcommands for:
//! - `run`: Follow the current session and print live snapshots
//! - `session`: Show which session would be followed right now
//! - `config`: Show the effective configuration

mod run;
mod session;

pub use run::RunArgs;
pub use session::SessionArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pitlane")]
#[command(about = "Live motorsport timing synchronization and standings engine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow the live (or next) session and print snapshots
    Run(RunArgs),
    /// Show the session that would be followed now
    Session(SessionArgs),
    /// Show the effective configuration
    Config,
}
