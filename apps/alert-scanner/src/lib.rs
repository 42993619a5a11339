#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Alert Scanner - Market Hours Stock Alert Bot
//!
//! Polls the Mboum market data API while the operating window is open,
//! evaluates per-symbol alert rules, and forwards alerts to a Telegram chat.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure scanner types and rules
//!   - `market_hours`: Operating window, holiday calendar, clock gate
//!   - `snapshot`: Validated quote snapshots
//!   - `history`: Per-symbol state owned by the scan loop
//!   - `evaluator`: Alert rules
//!   - `alerts`: Alert events and chat rendering
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Market data, alert dispatch, clock
//!   - `services`: Scan loop, scheduler, scan status
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `mboum`: Market data over HTTP
//!   - `telegram`: Alert delivery over HTTP
//!   - `calendar`: Holiday calendar loading
//!   - `config`: Configuration from the environment
//!   - `health`: Health check and metrics HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//!                ┌────────────┐   ┌───────────┐   ┌────────────┐
//! Scheduler ───► │ Clock Gate │──►│  Mboum    │──►│ Evaluator  │──► Telegram
//!  (10s/2m/5m)   └────────────┘   └───────────┘   └────────────┘
//!                                                   SymbolStore
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Scanner types and rules with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::alerts::{AlertEvent, AlertKind, AlertPayload, BidTier};
pub use domain::evaluator::{AlertEvaluator, EvaluatorConfig, Watchlist};
pub use domain::market_hours::{
    ClockGate, ClosedReason, GateDecision, OpenWindow, OperatingWindow, StaticHolidayCalendar,
};
pub use domain::options::{OptionType, OptionsActivity};
pub use domain::snapshot::{QuoteSnapshot, SnapshotError, Symbol};

// Ports
pub use application::ports::{
    AlertDispatchPort, Clock, DispatchError, FetchError, FixedClock, MarketDataPort,
    RecordingDispatcher, SnapshotResult, SystemClock,
};

// Services
pub use application::services::{
    ScanExit, ScanLoop, ScanPhase, ScanPorts, ScanStatus, ScheduledTask, Scheduler, TickOutcome,
    report_crash, supervise,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ScannerConfig};

// Adapters
pub use infrastructure::calendar::load_calendar;
pub use infrastructure::mboum::{MboumClient, MboumError};
pub use infrastructure::telegram::{LogDispatcher, TelegramDispatcher, TelegramError};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
