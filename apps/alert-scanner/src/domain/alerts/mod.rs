//! Alert Events
//!
//! Alerts produced by the evaluator and the periodic summaries. Each alert is
//! rendered to plain text exactly once and handed to the dispatcher.
//!
//! Every constructor takes an [`OpenWindow`], so an alert can only exist if
//! the clock gate was open when it was built.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::market_hours::OpenWindow;
use crate::domain::options::OptionsActivity;
use crate::domain::ranking::GainerEntry;
use crate::domain::snapshot::Symbol;

// =============================================================================
// Alert Kind
// =============================================================================

/// The seven alert categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Bid price/size crossed a threshold pair.
    BidMatch,
    /// Interval volume far above the symbol's recent baseline.
    VolumeSpike,
    /// Session volume far above the average daily volume.
    UnusualActivity,
    /// Options contract volume far above open interest.
    UnusualOptions,
    /// Trading halted after a bid match.
    Halt,
    /// Large sell-side volume on a watchlist symbol.
    LargeSale,
    /// Periodic top gainers summary.
    TopGainers,
}

impl AlertKind {
    /// All kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BidMatch,
            Self::VolumeSpike,
            Self::UnusualActivity,
            Self::UnusualOptions,
            Self::Halt,
            Self::LargeSale,
            Self::TopGainers,
        ]
    }

    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BidMatch => "bid_match",
            Self::VolumeSpike => "volume_spike",
            Self::UnusualActivity => "unusual_activity",
            Self::UnusualOptions => "unusual_options",
            Self::Halt => "halt",
            Self::LargeSale => "large_sale",
            Self::TopGainers => "top_gainers",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which bid threshold pair matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BidTier {
    /// Bid >= $199,999 with size >= 100.
    Premium,
    /// Bid >= $2,000 with size >= 20.
    HighValue,
}

// =============================================================================
// Payloads
// =============================================================================

/// Alert-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertPayload {
    /// Bid match.
    BidMatch {
        /// Ticker.
        symbol: Symbol,
        /// Matched threshold pair.
        tier: BidTier,
        /// Bid price.
        bid_price: Decimal,
        /// Bid size.
        bid_size: u64,
    },
    /// Volume spike.
    VolumeSpike {
        /// Ticker.
        symbol: Symbol,
        /// Shares traded since the previous snapshot.
        interval_volume: u64,
        /// Mean interval volume over the baseline window.
        baseline_mean: f64,
        /// Standard score against the baseline, when the baseline varies.
        z_score: Option<f64>,
        /// Last price.
        last_price: Decimal,
    },
    /// Unusual activity.
    UnusualActivity {
        /// Ticker.
        symbol: Symbol,
        /// Session volume.
        volume: u64,
        /// Average daily volume.
        average_volume: u64,
        /// Session volume / average daily volume.
        relative_volume: f64,
        /// Change against the previous close.
        change_percent: Option<Decimal>,
    },
    /// Unusual options.
    UnusualOptions {
        /// The flagged contract.
        activity: OptionsActivity,
    },
    /// Halt following a bid match.
    Halt {
        /// Ticker.
        symbol: Symbol,
        /// Bid price of the preceding match.
        matched_bid: Decimal,
        /// When the preceding match was alerted.
        matched_at: DateTime<Utc>,
    },
    /// Large sale.
    LargeSale {
        /// Ticker.
        symbol: Symbol,
        /// Shares traded since the previous snapshot.
        shares: u64,
        /// Last price.
        price: Decimal,
        /// Shares x price.
        notional: Decimal,
    },
    /// Top gainers summary.
    TopGainers {
        /// Ranked entries, at most ten.
        entries: Vec<GainerEntry>,
    },
}

impl AlertPayload {
    /// The alert kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> AlertKind {
        match self {
            Self::BidMatch { .. } => AlertKind::BidMatch,
            Self::VolumeSpike { .. } => AlertKind::VolumeSpike,
            Self::UnusualActivity { .. } => AlertKind::UnusualActivity,
            Self::UnusualOptions { .. } => AlertKind::UnusualOptions,
            Self::Halt { .. } => AlertKind::Halt,
            Self::LargeSale { .. } => AlertKind::LargeSale,
            Self::TopGainers { .. } => AlertKind::TopGainers,
        }
    }

    /// The symbol the alert is about, if it concerns a single one.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        match self {
            Self::BidMatch { symbol, .. }
            | Self::VolumeSpike { symbol, .. }
            | Self::UnusualActivity { symbol, .. }
            | Self::Halt { symbol, .. }
            | Self::LargeSale { symbol, .. } => Some(symbol),
            Self::UnusualOptions { activity } => Some(&activity.underlying),
            Self::TopGainers { .. } => None,
        }
    }
}

// =============================================================================
// Alert Event
// =============================================================================

/// An alert ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    id: Uuid,
    timestamp: DateTime<Utc>,
    payload: AlertPayload,
}

impl AlertEvent {
    /// Build an alert stamped with the gate check time.
    #[must_use]
    pub fn new(window: &OpenWindow, payload: AlertPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: window.checked_at(),
            payload,
        }
    }

    /// Unique id for log correlation.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// When the alert was raised.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Alert kind.
    #[must_use]
    pub const fn kind(&self) -> AlertKind {
        self.payload.kind()
    }

    /// Symbol, if the alert concerns one.
    #[must_use]
    pub const fn symbol(&self) -> Option<&Symbol> {
        self.payload.symbol()
    }

    /// Alert fields.
    #[must_use]
    pub const fn payload(&self) -> &AlertPayload {
        &self.payload
    }

    /// Render the chat message text.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            AlertPayload::BidMatch {
                symbol,
                tier,
                bid_price,
                bid_size,
            } => {
                let title = match tier {
                    BidTier::Premium => "PREMIUM BID MATCH",
                    BidTier::HighValue => "HIGH VALUE BID",
                };
                write!(f, "⚡ {title}: {symbol}\n${bid_price} with {bid_size} shares")
            }
            AlertPayload::VolumeSpike {
                symbol,
                interval_volume,
                baseline_mean,
                z_score,
                last_price,
            } => {
                write!(
                    f,
                    "📈 VOLUME SPIKE: {symbol}\n{interval_volume} shares vs {baseline_mean:.0} avg"
                )?;
                if let Some(z) = z_score {
                    write!(f, " ({z:.1}σ)")?;
                }
                write!(f, "\nLast ${last_price}")
            }
            AlertPayload::UnusualActivity {
                symbol,
                volume,
                average_volume,
                relative_volume,
                change_percent,
            } => {
                write!(
                    f,
                    "🔎 UNUSUAL ACTIVITY: {symbol}\nVolume {volume} is {relative_volume:.1}x avg {average_volume}"
                )?;
                if let Some(pct) = change_percent {
                    write!(f, "\nChange {}%", pct.round_dp(2))?;
                }
                Ok(())
            }
            AlertPayload::UnusualOptions { activity } => {
                write!(
                    f,
                    "🎯 UNUSUAL OPTIONS: {} ${} {} exp {}\nVol {} / OI {}",
                    activity.underlying,
                    activity.strike,
                    activity.option_type,
                    activity.expiration.format("%Y-%m-%d"),
                    activity.volume,
                    activity.open_interest,
                )?;
                if let Some(price) = activity.last_price {
                    write!(f, " @ ${price}")?;
                }
                Ok(())
            }
            AlertPayload::Halt {
                symbol,
                matched_bid,
                matched_at,
            } => write!(
                f,
                "⛔ HALT: {symbol}\nHalted after bid match ${matched_bid} at {}",
                matched_at.format("%H:%M:%S UTC")
            ),
            AlertPayload::LargeSale {
                symbol,
                shares,
                price,
                notional,
            } => write!(
                f,
                "🔻 LARGE SALE: {symbol}\n{shares} shares at ${price} (${})",
                notional.round_dp(0)
            ),
            AlertPayload::TopGainers { entries } => {
                write!(f, "🏆 TOP {} GAINERS:", entries.len())?;
                for entry in entries {
                    write!(
                        f,
                        "\n{}. {}: ${:.2} ({:.2}%)",
                        entry.rank, entry.symbol, entry.last_price, entry.change_percent
                    )?;
                }
                Ok(())
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
