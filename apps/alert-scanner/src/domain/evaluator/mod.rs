//! Alert Evaluation
//!
//! Turns each validated snapshot into zero or more alerts. Evaluation of a
//! snapshot is a lazy iterator over the per-snapshot rules in a fixed order:
//!
//! 1. Halt (consumes a bid match alerted on an earlier snapshot)
//! 2. Bid match
//! 3. Volume spike
//! 4. Unusual activity
//! 5. Large sale (watchlist symbols only)
//!
//! Building an [`Evaluation`] commits the snapshot to the symbol's history;
//! rule side effects (cooldowns, pending bid match, daily flags) apply as the
//! iterator is driven.
//!
//! Interval rules compare against the previous snapshot only when it is
//! fresh: seen on the same local date and no more than
//! [`EvaluatorConfig::max_snapshot_gap`] earlier. A symbol returning after a
//! gap starts a new interval instead of reporting everything traded while it
//! was away.

use std::collections::HashSet;

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::alerts::{AlertEvent, AlertKind, AlertPayload, BidTier};
use crate::domain::history::{
    ContractCooldowns, PendingBidMatch, SymbolState, SymbolStore, VolumeStats,
};
use crate::domain::market_hours::OpenWindow;
use crate::domain::options::{OptionsActivity, UnusualOptionsRule};
use crate::domain::ranking::{TOP_GAINERS_LIMIT, rank_gainers};
use crate::domain::snapshot::{QuoteSnapshot, Symbol};

// =============================================================================
// Configuration
// =============================================================================

/// A bid price/size threshold pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidThreshold {
    /// Minimum bid price, inclusive.
    pub min_price: Decimal,
    /// Minimum bid size, inclusive.
    pub min_size: u64,
}

impl BidThreshold {
    fn matches(&self, price: Decimal, size: u64) -> bool {
        size >= self.min_size && price >= self.min_price
    }
}

/// Rule thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatorConfig {
    /// Minimum gap between two alerts of the same kind for one symbol.
    pub cooldown: Duration,
    /// Premium bid threshold, checked first.
    pub premium_bid: BidThreshold,
    /// High value bid threshold.
    pub high_value_bid: BidThreshold,
    /// Interval volume samples kept per symbol.
    pub volume_window: usize,
    /// Samples required before a spike can fire.
    pub volume_min_samples: usize,
    /// Standard score that counts as a spike.
    pub volume_z_threshold: f64,
    /// Multiple of the mean that counts as a spike when the baseline is flat.
    pub volume_flat_multiplier: f64,
    /// Minimum interval volume for a spike.
    pub volume_min_shares: u64,
    /// Session volume / average volume that counts as unusual.
    pub relative_volume_threshold: f64,
    /// Interval volume that counts as a large sale.
    pub large_sale_min_shares: u64,
    /// Interval notional that counts as a large sale.
    pub large_sale_min_notional: Decimal,
    /// Unusual options thresholds.
    pub options: UnusualOptionsRule,
    /// Oldest previous snapshot still treated as the start of an interval.
    pub max_snapshot_gap: Duration,
    /// Idle time after which a symbol's state is discarded.
    pub idle_eviction: Duration,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            cooldown: Duration::minutes(5),
            premium_bid: BidThreshold {
                min_price: Decimal::from(199_999),
                min_size: 100,
            },
            high_value_bid: BidThreshold {
                min_price: Decimal::from(2_000),
                min_size: 20,
            },
            volume_window: 30,
            volume_min_samples: 10,
            volume_z_threshold: 3.0,
            volume_flat_multiplier: 3.0,
            volume_min_shares: 1_000,
            relative_volume_threshold: 3.0,
            large_sale_min_shares: 10_000,
            large_sale_min_notional: Decimal::from(1_000_000),
            options: UnusualOptionsRule::default(),
            max_snapshot_gap: Duration::seconds(60),
            idle_eviction: Duration::minutes(30),
        }
    }
}

// =============================================================================
// Watchlist
// =============================================================================

/// Symbols eligible for large sale alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watchlist {
    symbols: HashSet<Symbol>,
}

impl Watchlist {
    /// Build from symbols; blanks are dropped.
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        Self {
            symbols: symbols.into_iter().filter(|s| !s.is_empty()).collect(),
        }
    }

    /// Parse a comma-separated list such as `"AAPL, msft,TSLA"`.
    #[must_use]
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(',').map(Symbol::new))
    }

    /// Whether `symbol` is on the watchlist.
    #[must_use]
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    /// Number of symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether the watchlist is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Symbols in ascending order.
    #[must_use]
    pub fn sorted(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.symbols.iter().cloned().collect();
        symbols.sort();
        symbols
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Applies the alert rules.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    config: EvaluatorConfig,
}

impl AlertEvaluator {
    /// Create an evaluator with the given thresholds.
    #[must_use]
    pub const fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Which bid tier a price/size pair matches, premium first.
    #[must_use]
    pub fn match_bid(&self, price: Decimal, size: u64) -> Option<BidTier> {
        let tiers = [
            (BidTier::Premium, &self.config.premium_bid),
            (BidTier::HighValue, &self.config.high_value_bid),
        ];
        tiers
            .into_iter()
            .find(|(_, threshold)| threshold.matches(price, size))
            .map(|(tier, _)| tier)
    }

    /// Evaluate one snapshot against the symbol's history.
    ///
    /// The snapshot becomes the symbol's latest and its interval volume joins
    /// the baseline window before any alert is yielded. Dropping the iterator
    /// early skips the remaining rules without undoing that.
    pub fn evaluate<'a>(
        &'a self,
        window: &'a OpenWindow,
        state: &'a mut SymbolState,
        snapshot: QuoteSnapshot,
        watchlist: &'a Watchlist,
    ) -> Evaluation<'a> {
        let day = window.local_date();
        let now = window.checked_at();
        let continuous = state.is_fresh(day, now, self.config.max_snapshot_gap);
        state.mark_seen(now, day);
        let previous = state.advance(snapshot.clone()).filter(|_| continuous);
        let interval_volume = previous
            .as_ref()
            .map_or(0, |p| snapshot.volume.saturating_sub(p.volume));

        // Baseline excludes the interval being judged.
        let baseline = state.volumes().stats();
        if previous.is_some() {
            state.volumes_mut().push(interval_volume);
        }

        Evaluation {
            evaluator: self,
            window,
            state,
            watchlist,
            current: snapshot,
            has_previous: previous.is_some(),
            interval_volume,
            baseline,
            stage: Stage::Halt,
        }
    }

    /// Flag unusual options rows, one alert per contract per cooldown.
    pub fn evaluate_options(
        &self,
        window: &OpenWindow,
        activity: impl IntoIterator<Item = OptionsActivity>,
        cooldowns: &mut ContractCooldowns,
    ) -> Vec<AlertEvent> {
        let now = window.checked_at();
        activity
            .into_iter()
            .filter(|row| self.config.options.is_unusual(row))
            .filter(|row| cooldowns.try_mark(&row.contract, now, self.config.cooldown))
            .map(|row| AlertEvent::new(window, AlertPayload::UnusualOptions { activity: row }))
            .collect()
    }

    /// Summarize the biggest gainers among symbols quoted in recent scans.
    ///
    /// Returns `None` when no fresh symbol has a usable previous close.
    #[must_use]
    pub fn top_gainers(&self, window: &OpenWindow, store: &SymbolStore) -> Option<AlertEvent> {
        let fresh = store.fresh_snapshots(
            window.local_date(),
            window.checked_at(),
            self.config.max_snapshot_gap,
        );
        let entries = rank_gainers(fresh, TOP_GAINERS_LIMIT);
        if entries.is_empty() {
            return None;
        }
        Some(AlertEvent::new(window, AlertPayload::TopGainers { entries }))
    }
}

// =============================================================================
// Evaluation Iterator
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Halt,
    BidMatch,
    VolumeSpike,
    UnusualActivity,
    LargeSale,
    Done,
}

impl Stage {
    const fn next(self) -> Self {
        match self {
            Self::Halt => Self::BidMatch,
            Self::BidMatch => Self::VolumeSpike,
            Self::VolumeSpike => Self::UnusualActivity,
            Self::UnusualActivity => Self::LargeSale,
            Self::LargeSale | Self::Done => Self::Done,
        }
    }
}

/// Alerts raised by one snapshot, in rule order.
#[derive(Debug)]
pub struct Evaluation<'a> {
    evaluator: &'a AlertEvaluator,
    window: &'a OpenWindow,
    state: &'a mut SymbolState,
    watchlist: &'a Watchlist,
    current: QuoteSnapshot,
    has_previous: bool,
    interval_volume: u64,
    baseline: Option<VolumeStats>,
    stage: Stage,
}

impl Evaluation<'_> {
    /// Shares traded since the previous snapshot.
    #[must_use]
    pub const fn interval_volume(&self) -> u64 {
        self.interval_volume
    }

    fn config(&self) -> &EvaluatorConfig {
        &self.evaluator.config
    }

    fn cooled_down(&mut self, kind: AlertKind) -> bool {
        let now = self.window.checked_at();
        if self.state.in_cooldown(kind, now, self.config().cooldown) {
            return false;
        }
        self.state.mark_alerted(kind, now);
        true
    }

    fn halt(&mut self) -> Option<AlertPayload> {
        if !self.current.halted {
            return None;
        }
        let matched = self.state.take_pending_bid_match()?;
        Some(AlertPayload::Halt {
            symbol: self.current.symbol.clone(),
            matched_bid: matched.bid_price,
            matched_at: matched.at,
        })
    }

    fn bid_match(&mut self) -> Option<AlertPayload> {
        let tier = self
            .evaluator
            .match_bid(self.current.bid_price, self.current.bid_size)?;
        if !self.cooled_down(AlertKind::BidMatch) {
            return None;
        }
        self.state.set_pending_bid_match(PendingBidMatch {
            bid_price: self.current.bid_price,
            at: self.window.checked_at(),
        });
        Some(AlertPayload::BidMatch {
            symbol: self.current.symbol.clone(),
            tier,
            bid_price: self.current.bid_price,
            bid_size: self.current.bid_size,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn volume_spike(&mut self) -> Option<AlertPayload> {
        if !self.has_previous || self.interval_volume < self.config().volume_min_shares {
            return None;
        }
        let baseline = self.baseline?;
        if baseline.samples < self.config().volume_min_samples {
            return None;
        }

        let interval = self.interval_volume as f64;
        let z_score = baseline.z_score(interval);
        let spiked = match z_score {
            Some(z) => z >= self.config().volume_z_threshold,
            None => interval > baseline.mean * self.config().volume_flat_multiplier,
        };
        if !spiked || !self.cooled_down(AlertKind::VolumeSpike) {
            return None;
        }

        Some(AlertPayload::VolumeSpike {
            symbol: self.current.symbol.clone(),
            interval_volume: self.interval_volume,
            baseline_mean: baseline.mean,
            z_score,
            last_price: self.current.last_price,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn unusual_activity(&mut self) -> Option<AlertPayload> {
        let average = self.current.average_volume.filter(|&avg| avg > 0)?;
        let relative = self.current.volume as f64 / average as f64;
        let day = self.window.local_date();
        if relative < self.config().relative_volume_threshold
            || self.state.unusual_activity_alerted_on(day)
        {
            return None;
        }
        self.state.mark_unusual_activity(day);
        Some(AlertPayload::UnusualActivity {
            symbol: self.current.symbol.clone(),
            volume: self.current.volume,
            average_volume: average,
            relative_volume: relative,
            change_percent: self.current.change_percent(),
        })
    }

    fn large_sale(&mut self) -> Option<AlertPayload> {
        if !self.has_previous
            || self.interval_volume == 0
            || !self.watchlist.contains(&self.current.symbol)
        {
            return None;
        }
        // Trades at or below the bid are seller-initiated.
        if self.current.last_price > self.current.bid_price {
            return None;
        }

        let notional = self.current.last_price * Decimal::from(self.interval_volume);
        let large = self.interval_volume >= self.config().large_sale_min_shares
            || notional >= self.config().large_sale_min_notional;
        if !large || !self.cooled_down(AlertKind::LargeSale) {
            return None;
        }

        Some(AlertPayload::LargeSale {
            symbol: self.current.symbol.clone(),
            shares: self.interval_volume,
            price: self.current.last_price,
            notional,
        })
    }
}

impl Iterator for Evaluation<'_> {
    type Item = AlertEvent;

    fn next(&mut self) -> Option<Self::Item> {
        while self.stage != Stage::Done {
            let stage = self.stage;
            self.stage = stage.next();
            let payload = match stage {
                Stage::Halt => self.halt(),
                Stage::BidMatch => self.bid_match(),
                Stage::VolumeSpike => self.volume_spike(),
                Stage::UnusualActivity => self.unusual_activity(),
                Stage::LargeSale => self.large_sale(),
                Stage::Done => None,
            };
            if let Some(payload) = payload {
                return Some(AlertEvent::new(self.window, payload));
            }
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
