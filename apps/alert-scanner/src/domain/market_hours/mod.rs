//! Market Hours Gating
//!
//! Decides whether the scanner may operate at a given instant. The window is
//! evaluated in a fixed reference time zone:
//!
//! - weekday Monday through Friday
//! - local time of day within `[start, end)`
//! - local date not a holiday
//!
//! A calendar that cannot answer closes the gate.
//!
//! An open decision carries an [`OpenWindow`] token. Alert constructors take a
//! reference to one, so alerts cannot be built while the gate is closed.

mod calendar;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

pub use calendar::{CalendarError, HolidayCalendar, StaticHolidayCalendar, UnavailableCalendar};

#[cfg(test)]
pub use calendar::MockHolidayCalendar;

// =============================================================================
// Operating Window
// =============================================================================

/// Default reference time zone.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Weekday time-of-day range in a reference time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatingWindow {
    timezone: Tz,
    start: NaiveTime,
    end: NaiveTime,
}

impl OperatingWindow {
    /// Create a window. `start` must be strictly before `end`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` if `start >= end`.
    pub fn new(timezone: Tz, start: NaiveTime, end: NaiveTime) -> Result<Self, InvalidWindow> {
        if start >= end {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self {
            timezone,
            start,
            end,
        })
    }

    /// Reference time zone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Inclusive start of the window.
    #[must_use]
    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    /// Exclusive end of the window.
    #[must_use]
    pub const fn end(&self) -> NaiveTime {
        self.end
    }

    fn contains_time(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}

impl Default for OperatingWindow {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Window whose start is not before its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operating window start {start} must be before end {end}")]
pub struct InvalidWindow {
    /// Requested start.
    pub start: NaiveTime,
    /// Requested end.
    pub end: NaiveTime,
}

// =============================================================================
// Gate Decision
// =============================================================================

/// Proof that the gate was open at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenWindow {
    checked_at: DateTime<Utc>,
    local_date: NaiveDate,
    local_time: NaiveTime,
}

impl OpenWindow {
    /// Instant the gate was checked.
    #[must_use]
    pub const fn checked_at(&self) -> DateTime<Utc> {
        self.checked_at
    }

    /// Trading date in the reference zone.
    #[must_use]
    pub const fn local_date(&self) -> NaiveDate {
        self.local_date
    }

    /// Time of day in the reference zone.
    #[must_use]
    pub const fn local_time(&self) -> NaiveTime {
        self.local_time
    }

    /// Token for unit tests that do not exercise the gate itself.
    #[cfg(test)]
    #[must_use]
    pub fn for_tests(at: DateTime<Utc>) -> Self {
        let local = at.with_timezone(&DEFAULT_TIMEZONE);
        Self {
            checked_at: at,
            local_date: local.date_naive(),
            local_time: local.time(),
        }
    }
}

/// Why the gate is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosedReason {
    /// Saturday or Sunday in the reference zone.
    Weekend,
    /// Outside the time-of-day range.
    OutsideHours,
    /// Date is a market holiday.
    Holiday,
    /// The holiday calendar could not answer.
    CalendarUnavailable(CalendarError),
}

impl ClosedReason {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Weekend => "weekend",
            Self::OutsideHours => "outside_hours",
            Self::Holiday => "holiday",
            Self::CalendarUnavailable(_) => "calendar_unavailable",
        }
    }
}

impl fmt::Display for ClosedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CalendarUnavailable(err) => write!(f, "{}: {err}", self.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// Result of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Scanning is permitted.
    Open(OpenWindow),
    /// Scanning is not permitted.
    Closed(ClosedReason),
}

impl GateDecision {
    /// Whether the gate is open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// The open-window token, if open.
    #[must_use]
    pub const fn open_window(&self) -> Option<&OpenWindow> {
        match self {
            Self::Open(window) => Some(window),
            Self::Closed(_) => None,
        }
    }
}

// =============================================================================
// Clock Gate
// =============================================================================

/// Operating window gate.
#[derive(Clone)]
pub struct ClockGate {
    window: OperatingWindow,
    calendar: Arc<dyn HolidayCalendar>,
}

impl ClockGate {
    /// Create a gate over a window and holiday calendar.
    #[must_use]
    pub fn new(window: OperatingWindow, calendar: Arc<dyn HolidayCalendar>) -> Self {
        Self { window, calendar }
    }

    /// The configured window.
    #[must_use]
    pub const fn window(&self) -> &OperatingWindow {
        &self.window
    }

    /// Check whether `now` lies inside the operating window.
    #[must_use]
    pub fn check(&self, now: DateTime<Utc>) -> GateDecision {
        let local = now.with_timezone(&self.window.timezone);

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return GateDecision::Closed(ClosedReason::Weekend);
        }

        let local_time = local.time();
        if !self.window.contains_time(local_time) {
            return GateDecision::Closed(ClosedReason::OutsideHours);
        }

        let local_date = local.date_naive();
        match self.calendar.is_holiday(local_date) {
            Ok(true) => GateDecision::Closed(ClosedReason::Holiday),
            Ok(false) => GateDecision::Open(OpenWindow {
                checked_at: now,
                local_date,
                local_time,
            }),
            Err(err) => GateDecision::Closed(ClosedReason::CalendarUnavailable(err)),
        }
    }
}

impl fmt::Debug for ClockGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockGate")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
