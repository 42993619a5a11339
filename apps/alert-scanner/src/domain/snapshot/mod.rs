//! Quote Snapshot Types
//!
//! One polled observation of a symbol's quote/trade state. Snapshots are
//! immutable once built; the scanner keeps only the latest one per symbol.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Symbol
// =============================================================================

/// A stock ticker symbol, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, trimming whitespace and upper-casing.
    #[must_use]
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_uppercase())
    }

    /// Get the symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the symbol is empty after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// =============================================================================
// Quote Snapshot
// =============================================================================

/// A single polled observation of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Best bid price.
    pub bid_price: Decimal,
    /// Best bid size (shares).
    pub bid_size: u64,
    /// Best ask price, when reported.
    pub ask_price: Option<Decimal>,
    /// Best ask size, when reported.
    pub ask_size: Option<u64>,
    /// Last traded price.
    pub last_price: Decimal,
    /// Cumulative session volume.
    pub volume: u64,
    /// Previous session close.
    pub previous_close: Decimal,
    /// Average daily volume, when reported.
    pub average_volume: Option<u64>,
    /// Whether trading in the symbol is halted.
    pub halted: bool,
    /// When the snapshot was observed.
    pub observed_at: DateTime<Utc>,
}

impl QuoteSnapshot {
    /// Start building a snapshot for a symbol.
    #[must_use]
    pub fn builder(symbol: impl Into<Symbol>) -> QuoteSnapshotBuilder {
        QuoteSnapshotBuilder::new(symbol.into())
    }

    /// Percentage change of the last price against the previous close.
    ///
    /// Returns `None` when the previous close is zero.
    #[must_use]
    pub fn change_percent(&self) -> Option<Decimal> {
        if self.previous_close.is_zero() {
            return None;
        }
        Some((self.last_price - self.previous_close) / self.previous_close * Decimal::ONE_HUNDRED)
    }

    /// Notional value of the best bid (price x size).
    #[must_use]
    pub fn bid_notional(&self) -> Decimal {
        self.bid_price * Decimal::from(self.bid_size)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder that validates required fields before producing a snapshot.
///
/// Market data adapters fill whatever the upstream payload carries; `build`
/// rejects snapshots missing any required field.
#[derive(Debug, Clone)]
pub struct QuoteSnapshotBuilder {
    symbol: Symbol,
    bid_price: Option<Decimal>,
    bid_size: Option<u64>,
    ask_price: Option<Decimal>,
    ask_size: Option<u64>,
    last_price: Option<Decimal>,
    volume: Option<u64>,
    previous_close: Option<Decimal>,
    average_volume: Option<u64>,
    halted: bool,
    observed_at: Option<DateTime<Utc>>,
}

impl QuoteSnapshotBuilder {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bid_price: None,
            bid_size: None,
            ask_price: None,
            ask_size: None,
            last_price: None,
            volume: None,
            previous_close: None,
            average_volume: None,
            halted: false,
            observed_at: None,
        }
    }

    /// Set the bid price and size.
    #[must_use]
    pub const fn bid(mut self, price: Decimal, size: u64) -> Self {
        self.bid_price = Some(price);
        self.bid_size = Some(size);
        self
    }

    /// Set the bid price.
    #[must_use]
    pub const fn bid_price(mut self, price: Option<Decimal>) -> Self {
        self.bid_price = price;
        self
    }

    /// Set the bid size.
    #[must_use]
    pub const fn bid_size(mut self, size: Option<u64>) -> Self {
        self.bid_size = size;
        self
    }

    /// Set the ask price and size.
    #[must_use]
    pub const fn ask(mut self, price: Option<Decimal>, size: Option<u64>) -> Self {
        self.ask_price = price;
        self.ask_size = size;
        self
    }

    /// Set the last traded price.
    #[must_use]
    pub const fn last_price(mut self, price: Option<Decimal>) -> Self {
        self.last_price = price;
        self
    }

    /// Set the cumulative session volume.
    #[must_use]
    pub const fn volume(mut self, volume: Option<u64>) -> Self {
        self.volume = volume;
        self
    }

    /// Set the previous session close.
    #[must_use]
    pub const fn previous_close(mut self, close: Option<Decimal>) -> Self {
        self.previous_close = close;
        self
    }

    /// Set the average daily volume.
    #[must_use]
    pub const fn average_volume(mut self, volume: Option<u64>) -> Self {
        self.average_volume = volume;
        self
    }

    /// Mark the symbol as halted.
    #[must_use]
    pub const fn halted(mut self, halted: bool) -> Self {
        self.halted = halted;
        self
    }

    /// Set the observation time.
    #[must_use]
    pub const fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }

    /// Validate and build the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` if the symbol is empty, a required field is
    /// missing, or a price is negative.
    pub fn build(self) -> Result<QuoteSnapshot, SnapshotError> {
        if self.symbol.is_empty() {
            return Err(SnapshotError::EmptySymbol);
        }

        let symbol = self.symbol;
        let missing = |field: &'static str| SnapshotError::MissingField {
            symbol: symbol.clone(),
            field,
        };

        let bid_price = self.bid_price.ok_or_else(|| missing("bid_price"))?;
        let bid_size = self.bid_size.ok_or_else(|| missing("bid_size"))?;
        let last_price = self.last_price.ok_or_else(|| missing("last_price"))?;
        let volume = self.volume.ok_or_else(|| missing("volume"))?;
        let previous_close = self.previous_close.ok_or_else(|| missing("previous_close"))?;

        for (field, value) in [
            ("bid_price", bid_price),
            ("last_price", last_price),
            ("previous_close", previous_close),
        ] {
            if value.is_sign_negative() {
                return Err(SnapshotError::NegativePrice {
                    symbol: symbol.clone(),
                    field,
                });
            }
        }

        Ok(QuoteSnapshot {
            symbol,
            bid_price,
            bid_size,
            ask_price: self.ask_price,
            ask_size: self.ask_size,
            last_price,
            volume,
            previous_close,
            average_volume: self.average_volume,
            halted: self.halted,
            observed_at: self.observed_at.unwrap_or_else(Utc::now),
        })
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A snapshot that could not be built from upstream data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// Upstream row had no symbol.
    #[error("snapshot has an empty symbol")]
    EmptySymbol,

    /// A required field was absent or unparsable.
    #[error("{symbol}: missing required field {field}")]
    MissingField {
        /// Symbol of the rejected row.
        symbol: Symbol,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A price field was negative.
    #[error("{symbol}: negative value for {field}")]
    NegativePrice {
        /// Symbol of the rejected row.
        symbol: Symbol,
        /// Name of the offending field.
        field: &'static str,
    },
}

// =============================================================================
// Tests
// =============================================================================
