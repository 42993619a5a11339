//! Options Activity Types
//!
//! Rows from the unusual-options feed and the rule that flags them.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::snapshot::Symbol;

/// Call or put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    /// Call option.
    Call,
    /// Put option.
    Put,
}

impl OptionType {
    /// Parse from a feed label, case-insensitive.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" | "c" => Some(Self::Call),
            "put" | "p" => Some(Self::Put),
            _ => None,
        }
    }

    /// Upper-case label for messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "CALL",
            Self::Put => "PUT",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of unusual options activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsActivity {
    /// Underlying stock symbol.
    pub underlying: Symbol,
    /// Contract identifier (OCC symbol or feed-specific id).
    pub contract: String,
    /// Call or put.
    pub option_type: OptionType,
    /// Strike price.
    pub strike: Decimal,
    /// Expiration date.
    pub expiration: NaiveDate,
    /// Contracts traded today.
    pub volume: u64,
    /// Open interest.
    pub open_interest: u64,
    /// Last trade price of the contract.
    pub last_price: Option<Decimal>,
}

impl OptionsActivity {
    /// Volume to open interest ratio. `None` when open interest is zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn volume_oi_ratio(&self) -> Option<f64> {
        if self.open_interest == 0 {
            return None;
        }
        Some(self.volume as f64 / self.open_interest as f64)
    }
}

/// Thresholds for unusual options activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnusualOptionsRule {
    /// Minimum contracts traded.
    pub min_volume: u64,
    /// Minimum volume / open interest ratio.
    pub min_volume_oi_ratio: f64,
}

impl Default for UnusualOptionsRule {
    fn default() -> Self {
        Self {
            min_volume: 500,
            min_volume_oi_ratio: 2.0,
        }
    }
}

impl UnusualOptionsRule {
    /// Whether an activity row is unusual.
    ///
    /// Zero open interest with enough volume counts as unusual: every contract
    /// traded today opened a new position.
    #[must_use]
    pub fn is_unusual(&self, activity: &OptionsActivity) -> bool {
        if activity.volume < self.min_volume {
            return false;
        }
        activity
            .volume_oi_ratio()
            .is_none_or(|ratio| ratio >= self.min_volume_oi_ratio)
    }
}
