//! Holiday Calendar Loading
//!
//! Builds the calendar the clock gate consults. A configured holiday file
//! replaces the built-in NYSE table; a file that cannot be read or parsed
//! yields an [`UnavailableCalendar`], so the gate stays closed until the
//! file is fixed.
//!
//! # File Format (JSON)
//!
//! ```json
//! ["2026-01-01", "2026-01-19", "2026-12-25"]
//! ```

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::domain::market_hours::{HolidayCalendar, StaticHolidayCalendar, UnavailableCalendar};
use crate::infrastructure::config::CalendarSettings;

/// Holiday file errors.
#[derive(Debug, thiserror::Error)]
pub enum HolidayFileError {
    /// File could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// File path.
        path: String,
        /// I/O error.
        message: String,
    },

    /// File is not a JSON array of `YYYY-MM-DD` strings.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File path.
        path: String,
        /// Parse error.
        message: String,
    },
}

/// Read a JSON holiday list.
///
/// # Errors
///
/// Returns `HolidayFileError` if the file is missing or malformed.
pub fn read_holiday_file(path: &Path) -> Result<Vec<NaiveDate>, HolidayFileError> {
    let text = std::fs::read_to_string(path).map_err(|e| HolidayFileError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| HolidayFileError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Build the holiday calendar from settings.
#[must_use]
pub fn load_calendar(settings: &CalendarSettings) -> Arc<dyn HolidayCalendar> {
    let mut calendar = match &settings.holiday_file {
        Some(path) => match read_holiday_file(path) {
            Ok(dates) => {
                tracing::info!(
                    path = %path.display(),
                    dates = dates.len(),
                    "Loaded holiday file"
                );
                StaticHolidayCalendar::new(dates)
            }
            Err(e) => {
                tracing::error!(error = %e, "Holiday calendar unavailable, gate will stay closed");
                return Arc::new(UnavailableCalendar::new(e.to_string()));
            }
        },
        None => StaticHolidayCalendar::nyse(),
    };

    calendar.extend(settings.extra_holidays.iter().copied());
    tracing::debug!(
        dates = calendar.len(),
        years = ?calendar.covered_years(),
        "Holiday calendar ready"
    );
    Arc::new(calendar)
}
