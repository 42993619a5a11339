//! Application Ports (Driven)
//!
//! Interfaces the scan loop uses to reach the outside world. Infrastructure
//! adapters implement these; tests substitute mocks or in-memory fakes.

mod alert_dispatch_port;
mod clock_port;
mod market_data_port;

pub use alert_dispatch_port::{AlertDispatchPort, DispatchError, RecordingDispatcher};
#[cfg(test)]
pub use alert_dispatch_port::MockAlertDispatchPort;
pub use clock_port::{Clock, FixedClock, SystemClock};
pub use market_data_port::{FetchError, MarketDataPort, SnapshotResult};
#[cfg(test)]
pub use market_data_port::MockMarketDataPort;

/// Holiday lookups are a domain trait; re-exported here as the calendar port.
pub use crate::domain::market_hours::{CalendarError, HolidayCalendar as HolidayCalendarPort};
