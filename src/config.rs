//! Configuration types for pitlane

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for `session.live_window_hours`
pub const MAX_LIVE_WINDOW_HOURS: i64 = 48;

/// Upper bound for every offset given in seconds
pub const MAX_OFFSET_SECS: i64 = 86_400;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub standings: StandingsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Timing API client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request before the page is reported as failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between request attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api.openf1.org/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1500
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// A started session counts as live for this many hours when its end is unknown
    #[serde(default = "default_live_window_hours")]
    pub live_window_hours: i64,

    /// Delay between acquisition attempts (seconds)
    #[serde(default = "default_acquire_retry_secs")]
    pub acquire_retry_secs: u64,

    /// Additional acquisition attempts after the first one fails
    #[serde(default = "default_acquire_max_retries")]
    pub acquire_max_retries: u32,

    /// How often an upcoming session is re-checked for going live (seconds)
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Initial watermark sits this far before the latest known message (seconds)
    #[serde(default = "default_sync_lead_secs")]
    pub sync_lead_secs: i64,

    /// Initial watermark offset from now when the session has no messages yet (seconds)
    #[serde(default = "default_sync_fallback_secs")]
    pub sync_fallback_secs: i64,
}

fn default_live_window_hours() -> i64 {
    4
}
fn default_acquire_retry_secs() -> u64 {
    5
}
fn default_acquire_max_retries() -> u32 {
    6
}
fn default_probe_interval_secs() -> u64 {
    30
}
fn default_sync_lead_secs() -> i64 {
    5
}
fn default_sync_fallback_secs() -> i64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            live_window_hours: default_live_window_hours(),
            acquire_retry_secs: default_acquire_retry_secs(),
            acquire_max_retries: default_acquire_max_retries(),
            probe_interval_secs: default_probe_interval_secs(),
            sync_lead_secs: default_sync_lead_secs(),
            sync_fallback_secs: default_sync_fallback_secs(),
        }
    }
}

impl SessionConfig {
    pub fn acquire_retry_delay(&self) -> Duration {
        Duration::from_secs(self.acquire_retry_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn live_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.live_window_hours.clamp(1, MAX_LIVE_WINDOW_HOURS))
    }

    pub fn sync_lead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sync_lead_secs.clamp(0, MAX_OFFSET_SECS))
    }

    pub fn sync_fallback(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.sync_fallback_secs.clamp(0, MAX_OFFSET_SECS))
    }
}

/// Live polling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Tick cadence (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Car telemetry is requested over this rolling window (seconds)
    #[serde(default = "default_telemetry_window_secs")]
    pub telemetry_window_secs: i64,
}

fn default_interval_ms() -> u64 {
    2000
}
fn default_telemetry_window_secs() -> i64 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            telemetry_window_secs: default_telemetry_window_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn telemetry_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.telemetry_window_secs.clamp(0, MAX_OFFSET_SECS))
    }
}

/// Standings decoration thresholds
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct StandingsConfig {
    /// DRS channel values strictly above this mark an open flap
    #[serde(default = "default_drs_open_threshold")]
    pub drs_open_threshold: u32,

    /// Upper bound (exclusive) of the interval that makes MOM ready
    #[serde(default = "default_mom_window_secs")]
    pub mom_window_secs: f64,
}

fn default_drs_open_threshold() -> u32 {
    9
}
fn default_mom_window_secs() -> f64 {
    1.2
}

impl Default for StandingsConfig {
    fn default() -> Self {
        Self {
            drs_open_threshold: default_drs_open_threshold(),
            mom_window_secs: default_mom_window_secs(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject periods and offsets the runtime cannot use
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.api.timeout_secs > 0, "api.timeout_secs must be positive");
        anyhow::ensure!(
            (1..=MAX_LIVE_WINDOW_HOURS).contains(&self.session.live_window_hours),
            "session.live_window_hours must be between 1 and {}",
            MAX_LIVE_WINDOW_HOURS
        );
        anyhow::ensure!(
            self.session.probe_interval_secs > 0,
            "session.probe_interval_secs must be positive"
        );
        anyhow::ensure!(self.polling.interval_ms > 0, "polling.interval_ms must be positive");

        for (name, value) in [
            ("session.sync_lead_secs", self.session.sync_lead_secs),
            ("session.sync_fallback_secs", self.session.sync_fallback_secs),
            ("polling.telemetry_window_secs", self.polling.telemetry_window_secs),
        ] {
            anyhow::ensure!(
                (0..=MAX_OFFSET_SECS).contains(&value),
                "{} must be between 0 and {}",
                name,
                MAX_OFFSET_SECS
            );
        }
        Ok(())
    }
}
