//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Full poll tick, fetch through publish
    PollTick,
    /// Session acquisition round trip
    SessionAcquire,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Drivers holding a real (non-sentinel) position
    RankedDrivers,
    /// Race-control messages observed this session
    RaceControlMessages,
    /// Current lap of the leader
    CurrentLap,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// A single stream fetch failed and was treated as no data
    FetchFailure,
    /// A session acquisition attempt failed
    AcquireFailure,
    /// A snapshot was published
    SnapshotPublished,
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::PollTick => "pitlane_poll_tick_latency_ms",
        LatencyMetric::SessionAcquire => "pitlane_session_acquire_latency_ms",
    };

    ::metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::RankedDrivers => "pitlane_ranked_drivers",
        GaugeMetric::RaceControlMessages => "pitlane_race_control_messages",
        GaugeMetric::CurrentLap => "pitlane_current_lap",
    };

    ::metrics::gauge!(metric_name).set(value);
}

/// Increment a counter, labelled by stream where one applies
pub fn increment(metric: CounterMetric, stream: Option<&'static str>) {
    let metric_name = match metric {
        CounterMetric::FetchFailure => "pitlane_fetch_failures_total",
        CounterMetric::AcquireFailure => "pitlane_acquire_failures_total",
        CounterMetric::SnapshotPublished => "pitlane_snapshots_published_total",
    };

    match stream {
        Some(stream) => ::metrics::counter!(metric_name, "stream" => stream).increment(1),
        None => ::metrics::counter!(metric_name).increment(1),
    }
}
