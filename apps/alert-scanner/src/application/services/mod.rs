//! Application Services
//!
//! - `ScanLoop`: gate, fetch, evaluate and dispatch on each tick
//! - `Scheduler`: the three polling cadences
//! - `ScanStatus`: counters and phase shared with the health server
//! - `supervise`: watches the scan task next to the shutdown signal

mod scan_loop;
mod scheduler;
mod status;
mod supervisor;

pub use scan_loop::{SHUTDOWN_NOTICE, STARTUP_NOTICE, ScanLoop, ScanPorts, TickOutcome};
pub use scheduler::{ScheduledTask, Scheduler};
pub use status::{ScanPhase, ScanStatus, ScanStatusSnapshot};
pub use supervisor::{CRASH_NOTICE, ScanExit, crash_notice, report_crash, supervise};
