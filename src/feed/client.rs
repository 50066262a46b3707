//! OpenF1 REST client
//!
//! Each request is retried a bounded number of times with a fixed pause.
//! A page that still fails after the last attempt is returned as an error;
//! the orchestrator decides whether that degrades to "no data this tick".

use super::types::{
    CarData, Driver, Interval, Lap, Location, Position, RaceControlMessage, Session, Stint,
    WeatherSample,
};
use super::TimingFeed;
use crate::config::ApiConfig;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// OpenF1 API base URL
pub const OPENF1_API_URL: &str = "https://api.openf1.org/v1";

/// Configuration for the OpenF1 client
#[derive(Debug, Clone)]
pub struct OpenF1Config {
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Attempts per request
    pub max_retries: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for OpenF1Config {
    fn default() -> Self {
        Self {
            base_url: OPENF1_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_millis(1500),
        }
    }
}

impl From<&ApiConfig> for OpenF1Config {
    fn from(config: &ApiConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
        }
    }
}

/// Client for the OpenF1 timing API
pub struct OpenF1Client {
    config: OpenF1Config,
    client: Client,
}

impl OpenF1Client {
    /// Create a new client with default configuration
    pub fn new() -> anyhow::Result<Self> {
        Self::with_config(OpenF1Config::default())
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: OpenF1Config) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Build the URL for an endpoint
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// GET a JSON array, retrying transient failures
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Vec<T>> {
        let url = self.endpoint(path);
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.get_once(&url, query).await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    tracing::debug!(url = %url, attempt, error = %e, "Timing request failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("No attempts made for {}", url)))
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<Vec<T>> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenF1 API error: {} - {}", status, body);
        }

        let body = response.text().await?;
        parse_page(&body)
    }
}

/// Parse a response body into records
///
/// The API answers with an object (e.g. `{"detail": "No results found."}`)
/// instead of an empty array when nothing matches.
fn parse_page<T: DeserializeOwned>(body: &str) -> anyhow::Result<Vec<T>> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    match value {
        serde_json::Value::Array(_) => Ok(serde_json::from_value(value)?),
        serde_json::Value::Object(_) => Ok(Vec::new()),
        other => anyhow::bail!("Unexpected response shape: {}", other),
    }
}

/// Format a lower-bound timestamp for the `date>` filter
fn format_since(since: DateTime<Utc>) -> String {
    since.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn session_query(session_key: u32) -> Vec<(&'static str, String)> {
    vec![("session_key", session_key.to_string())]
}

fn session_query_since(
    session_key: u32,
    since: Option<DateTime<Utc>>,
) -> Vec<(&'static str, String)> {
    let mut query = session_query(session_key);
    if let Some(since) = since {
        query.push(("date>", format_since(since)));
    }
    query
}

#[async_trait]
impl TimingFeed for OpenF1Client {
    async fn sessions(&self, year: i32) -> anyhow::Result<Vec<Session>> {
        self.get_json("sessions", &[("year", year.to_string())]).await
    }

    async fn drivers(&self, session_key: u32) -> anyhow::Result<Vec<Driver>> {
        self.get_json("drivers", &session_query(session_key)).await
    }

    async fn meeting_drivers(&self, meeting_key: u32) -> anyhow::Result<Vec<Driver>> {
        self.get_json("drivers", &[("meeting_key", meeting_key.to_string())])
            .await
    }

    async fn positions(
        &self,
        session_key: u32,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<Position>> {
        self.get_json("position", &session_query_since(session_key, since))
            .await
    }

    async fn intervals(&self, session_key: u32) -> anyhow::Result<Vec<Interval>> {
        self.get_json("intervals", &session_query(session_key)).await
    }

    async fn locations(
        &self,
        session_key: u32,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Location>> {
        self.get_json("location", &session_query_since(session_key, Some(since)))
            .await
    }

    async fn car_data(
        &self,
        session_key: u32,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Vec<CarData>> {
        self.get_json("car_data", &session_query_since(session_key, Some(since)))
            .await
    }

    async fn race_control(&self, session_key: u32) -> anyhow::Result<Vec<RaceControlMessage>> {
        self.get_json("race_control", &session_query(session_key))
            .await
    }

    async fn weather(
        &self,
        session_key: u32,
        since: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Vec<WeatherSample>> {
        self.get_json("weather", &session_query_since(session_key, since))
            .await
    }

    async fn laps(&self, session_key: u32, driver_number: u32) -> anyhow::Result<Vec<Lap>> {
        let mut query = session_query(session_key);
        query.push(("driver_number", driver_number.to_string()));
        self.get_json("laps", &query).await
    }

    async fn stints(&self, session_key: u32) -> anyhow::Result<Vec<Stint>> {
        self.get_json("stints", &session_query(session_key)).await
    }
}
