//! Scan status shared with the health server.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// What the scan loop is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Not started yet.
    Starting,
    /// Waiting for the next tick.
    Idle,
    /// Consulting the clock gate.
    Gating,
    /// Waiting on market data.
    Fetching,
    /// Running rules.
    Evaluating,
    /// Sending alerts.
    Dispatching,
    /// Loop has exited.
    Stopped,
    /// Loop ended without being asked to.
    Failed,
}

/// Counters and last-known state of the scan loop.
#[derive(Debug)]
pub struct ScanStatus {
    phase: RwLock<ScanPhase>,
    gate_open: AtomicBool,
    closed_reason: RwLock<Option<&'static str>>,
    last_fetch_ok_at: RwLock<Option<DateTime<Utc>>>,
    last_fetch_failed: AtomicBool,
    last_error: RwLock<Option<String>>,
    scans: AtomicU64,
    alerts_sent: AtomicU64,
    fetch_failures: AtomicU64,
    dispatch_failures: AtomicU64,
    rows_rejected: AtomicU64,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanStatus {
    /// Fresh status in the `Starting` phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: RwLock::new(ScanPhase::Starting),
            gate_open: AtomicBool::new(false),
            closed_reason: RwLock::new(None),
            last_fetch_ok_at: RwLock::new(None),
            last_fetch_failed: AtomicBool::new(false),
            last_error: RwLock::new(None),
            scans: AtomicU64::new(0),
            alerts_sent: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
            rows_rejected: AtomicU64::new(0),
        }
    }

    /// Set the current phase.
    pub fn set_phase(&self, phase: ScanPhase) {
        *self.phase.write() = phase;
    }

    /// Record a gate decision.
    pub fn set_gate(&self, open: bool, closed_reason: Option<&'static str>) {
        self.gate_open.store(open, Ordering::Relaxed);
        *self.closed_reason.write() = closed_reason;
    }

    /// Count one scan tick.
    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful fetch.
    pub fn record_fetch_ok(&self, at: DateTime<Utc>) {
        *self.last_fetch_ok_at.write() = Some(at);
        self.last_fetch_failed.store(false, Ordering::Relaxed);
        *self.last_error.write() = None;
    }

    /// Record a failed fetch.
    pub fn record_fetch_failure(&self, message: String) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        self.last_fetch_failed.store(true, Ordering::Relaxed);
        *self.last_error.write() = Some(message);
    }

    /// Count a delivered alert.
    pub fn record_alert_sent(&self) {
        self.alerts_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed delivery.
    pub fn record_dispatch_failure(&self) {
        self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that the loop died, keeping `message` as the last error.
    pub fn record_crash(&self, message: String) {
        self.set_phase(ScanPhase::Failed);
        *self.last_error.write() = Some(message);
    }

    /// Count rejected upstream rows.
    pub fn record_rejected(&self, count: u64) {
        self.rows_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy for reporting.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatusSnapshot {
        ScanStatusSnapshot {
            phase: *self.phase.read(),
            gate_open: self.gate_open.load(Ordering::Relaxed),
            closed_reason: *self.closed_reason.read(),
            last_fetch_ok_at: *self.last_fetch_ok_at.read(),
            last_fetch_failed: self.last_fetch_failed.load(Ordering::Relaxed),
            last_error: self.last_error.read().clone(),
            scans: self.scans.load(Ordering::Relaxed),
            alerts_sent: self.alerts_sent.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`ScanStatus`] at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanStatusSnapshot {
    /// Current phase.
    pub phase: ScanPhase,
    /// Last gate decision.
    pub gate_open: bool,
    /// Why the gate was closed, if it was.
    pub closed_reason: Option<&'static str>,
    /// Time of the last successful snapshot fetch.
    pub last_fetch_ok_at: Option<DateTime<Utc>>,
    /// Whether the most recent fetch failed.
    pub last_fetch_failed: bool,
    /// Most recent fetch error.
    pub last_error: Option<String>,
    /// Scan ticks processed.
    pub scans: u64,
    /// Alerts delivered.
    pub alerts_sent: u64,
    /// Failed fetches.
    pub fetch_failures: u64,
    /// Failed deliveries.
    pub dispatch_failures: u64,
    /// Upstream rows rejected by validation.
    pub rows_rejected: u64,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn fetch_ok_clears_failure() {
        let status = ScanStatus::new();
        status.record_fetch_failure("timeout".into());
        assert!(status.snapshot().last_fetch_failed);

        let at = Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap();
        status.record_fetch_ok(at);
        let snap = status.snapshot();
        assert!(!snap.last_fetch_failed);
        assert_eq!(snap.last_error, None);
        assert_eq!(snap.last_fetch_ok_at, Some(at));
        assert_eq!(snap.fetch_failures, 1);
    }

    #[test]
    fn gate_and_phase() {
        let status = ScanStatus::default();
        assert_eq!(status.snapshot().phase, ScanPhase::Starting);
        status.set_phase(ScanPhase::Fetching);
        status.set_gate(false, Some("weekend"));
        let snap = status.snapshot();
        assert_eq!(snap.phase, ScanPhase::Fetching);
        assert!(!snap.gate_open);
        assert_eq!(snap.closed_reason, Some("weekend"));
    }

    #[test]
    fn crash_sets_failed_phase() {
        let status = ScanStatus::new();
        status.set_phase(ScanPhase::Evaluating);
        status.record_crash("index out of bounds".into());
        let snap = status.snapshot();
        assert_eq!(snap.phase, ScanPhase::Failed);
        assert_eq!(snap.last_error.as_deref(), Some("index out of bounds"));
    }

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ScanPhase::Dispatching).unwrap(),
            "\"dispatching\""
        );
    }
}
