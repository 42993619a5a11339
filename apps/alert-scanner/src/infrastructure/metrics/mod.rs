//! Prometheus Metrics Module
//!
//! Exposes scanner metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Scans**: Scan ticks by outcome, current gate state
//! - **Alerts**: Alerts dispatched by kind
//! - **Failures**: Fetch and dispatch failures by reason, rejected snapshots
//! - **Latency**: Market data fetch duration
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::alerts::AlertKind;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, or return the existing handle.
///
/// # Errors
///
/// Returns `BuildError` if the recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "alert_scanner_scans_total",
        "Total scan ticks by outcome"
    );
    describe_gauge!(
        "alert_scanner_gate_open",
        "1 while the operating window is open, 0 otherwise"
    );

    describe_counter!(
        "alert_scanner_alerts_total",
        "Total alerts dispatched by kind"
    );

    describe_counter!(
        "alert_scanner_fetch_failures_total",
        "Total market data fetch failures by reason"
    );
    describe_counter!(
        "alert_scanner_dispatch_failures_total",
        "Total alert dispatch failures by reason"
    );
    describe_counter!(
        "alert_scanner_snapshots_rejected_total",
        "Total upstream rows rejected by snapshot validation"
    );

    describe_histogram!(
        "alert_scanner_fetch_seconds",
        "Market data fetch duration by feed"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for scan outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Gate closed; nothing fetched.
    Closed,
    /// Snapshots fetched and evaluated.
    Completed,
    /// Fetch failed or timed out.
    FetchFailed,
}

impl ScanOutcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Completed => "completed",
            Self::FetchFailed => "fetch_failed",
        }
    }
}

/// Metric labels for market data feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// Quote snapshots.
    Snapshots,
    /// Unusual options activity.
    Options,
}

impl FeedKind {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Snapshots => "snapshots",
            Self::Options => "options",
        }
    }
}

/// Record one scan tick.
pub fn record_scan(outcome: ScanOutcome) {
    counter!(
        "alert_scanner_scans_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Update the gate state gauge.
pub fn set_gate_open(open: bool) {
    gauge!("alert_scanner_gate_open").set(if open { 1.0 } else { 0.0 });
}

/// Record a dispatched alert.
pub fn record_alert(kind: AlertKind) {
    counter!(
        "alert_scanner_alerts_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a failed fetch.
pub fn record_fetch_failure(feed: FeedKind, reason: &'static str) {
    counter!(
        "alert_scanner_fetch_failures_total",
        "feed" => feed.as_str(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a failed dispatch.
pub fn record_dispatch_failure(reason: &'static str) {
    counter!(
        "alert_scanner_dispatch_failures_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record rejected upstream rows.
pub fn record_snapshots_rejected(count: u64) {
    counter!("alert_scanner_snapshots_rejected_total").increment(count);
}

/// Record fetch duration.
pub fn record_fetch_duration(feed: FeedKind, duration: Duration) {
    histogram!(
        "alert_scanner_fetch_seconds",
        "feed" => feed.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_outcome_as_str() {
        assert_eq!(ScanOutcome::Closed.as_str(), "closed");
        assert_eq!(ScanOutcome::Completed.as_str(), "completed");
        assert_eq!(ScanOutcome::FetchFailed.as_str(), "fetch_failed");
    }

    #[test]
    fn feed_kind_as_str() {
        assert_eq!(FeedKind::Snapshots.as_str(), "snapshots");
        assert_eq!(FeedKind::Options.as_str(), "options");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_scan(ScanOutcome::Completed);
        record_alert(AlertKind::BidMatch);
        record_fetch_duration(FeedKind::Snapshots, Duration::from_millis(120));
    }
}
