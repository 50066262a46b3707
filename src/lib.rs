//! pitlane: live motorsport timing synchronization and derivation engine
//!
//! This library provides the core components for:
//! - Session discovery with bounded retry and live probing
//! - Incremental polling of timing streams behind per-stream watermarks
//! - Latest-by-driver merging of positions, intervals and locations
//! - Track status classification from the race-control log
//! - Standings derivation (gaps, position change, aero and MOM state)
//! - Fail-static snapshot publishing
//! - Full observability stack

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod orchestrator;
pub mod session;
pub mod standings;
pub mod sync;
pub mod telemetry;
pub mod track_status;

pub use engine::{Engine, EngineHandle, EngineStatus};
pub use error::SyncError;
