//! Holiday calendar.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};

/// Answers whether a local date is a market holiday.
///
/// Implementations return `Err` when they cannot answer for the date; the
/// clock gate treats that as closed.
#[cfg_attr(test, mockall::automock)]
pub trait HolidayCalendar: Send + Sync {
    /// Check whether `date` is a full-day market closure.
    ///
    /// # Errors
    ///
    /// Returns `CalendarError` if the calendar has no data for the date.
    fn is_holiday(&self, date: NaiveDate) -> Result<bool, CalendarError>;
}

/// Calendar lookup failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    /// The calendar has no dates for the requested year.
    #[error("holiday calendar does not cover {year}")]
    NotCovered {
        /// Requested year.
        year: i32,
    },

    /// The calendar could not be loaded.
    #[error("holiday calendar unavailable: {0}")]
    Unavailable(String),
}

/// NYSE full-day closures.
const NYSE_HOLIDAYS: &[(i32, u32, u32)] = &[
    // 2025
    (2025, 1, 1),
    (2025, 1, 9),
    (2025, 1, 20),
    (2025, 2, 17),
    (2025, 4, 18),
    (2025, 5, 26),
    (2025, 6, 19),
    (2025, 7, 4),
    (2025, 9, 1),
    (2025, 11, 27),
    (2025, 12, 25),
    // 2026
    (2026, 1, 1),
    (2026, 1, 19),
    (2026, 2, 16),
    (2026, 4, 3),
    (2026, 5, 25),
    (2026, 6, 19),
    (2026, 7, 3),
    (2026, 9, 7),
    (2026, 11, 26),
    (2026, 12, 25),
    // 2027
    (2027, 1, 1),
    (2027, 1, 18),
    (2027, 2, 15),
    (2027, 3, 26),
    (2027, 5, 31),
    (2027, 6, 18),
    (2027, 7, 5),
    (2027, 9, 6),
    (2027, 11, 25),
    (2027, 12, 24),
];

/// In-memory holiday calendar.
///
/// Covers exactly the years that have at least one configured date.
#[derive(Debug, Clone, Default)]
pub struct StaticHolidayCalendar {
    dates: BTreeSet<NaiveDate>,
    covered_years: BTreeSet<i32>,
}

impl StaticHolidayCalendar {
    /// Build a calendar from a list of dates.
    #[must_use]
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut calendar = Self::default();
        calendar.extend(dates);
        calendar
    }

    /// The built-in NYSE calendar.
    #[must_use]
    pub fn nyse() -> Self {
        Self::new(
            NYSE_HOLIDAYS
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        )
    }

    /// Add more dates, extending coverage to their years.
    pub fn extend(&mut self, dates: impl IntoIterator<Item = NaiveDate>) {
        for date in dates {
            self.covered_years.insert(date.year());
            self.dates.insert(date);
        }
    }

    /// Number of holiday dates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the calendar has no dates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Years this calendar can answer for.
    #[must_use]
    pub fn covered_years(&self) -> Vec<i32> {
        self.covered_years.iter().copied().collect()
    }
}

impl HolidayCalendar for StaticHolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> Result<bool, CalendarError> {
        if !self.covered_years.contains(&date.year()) {
            return Err(CalendarError::NotCovered { year: date.year() });
        }
        Ok(self.dates.contains(&date))
    }
}

/// Calendar that failed to load. Every lookup fails.
#[derive(Debug, Clone)]
pub struct UnavailableCalendar {
    reason: String,
}

impl UnavailableCalendar {
    /// Create an unavailable calendar with the load failure reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl HolidayCalendar for UnavailableCalendar {
    fn is_holiday(&self, _date: NaiveDate) -> Result<bool, CalendarError> {
        Err(CalendarError::Unavailable(self.reason.clone()))
    }
}
