//! Domain Layer - Scanner types and alert rules.
//!
//! Pure types and logic with no I/O: the clock gate, quote snapshots,
//! per-symbol history, alert rules, and the top gainers ranking.

/// Alert events and their chat rendering.
pub mod alerts;

/// Rule evaluation over snapshots and options activity.
pub mod evaluator;

/// Per-symbol history owned by the scan loop.
pub mod history;

/// Operating window and holiday calendar.
pub mod market_hours;

/// Unusual options activity rows.
pub mod options;

/// Top gainers ranking.
pub mod ranking;

/// Validated quote snapshots.
pub mod snapshot;
