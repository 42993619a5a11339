//! Per-Symbol History
//!
//! The scan loop owns a [`SymbolStore`] and is its only writer. Each symbol
//! keeps its last snapshot, a rolling window of interval volumes, and the
//! bookkeeping the evaluator needs (cooldowns, outstanding bid match, daily
//! once-only flags).
//!
//! State is scoped to a trading day. The first sighting on a new local date
//! drops the volume baseline and any outstanding bid match, and symbols that
//! stop appearing are evicted by [`SymbolStore::evict_idle`].

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::alerts::AlertKind;
use crate::domain::snapshot::{QuoteSnapshot, Symbol};

// =============================================================================
// Volume Window
// =============================================================================

/// Mean and population standard deviation of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeStats {
    /// Sample count.
    pub samples: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl VolumeStats {
    /// Standard score of `value`; `None` when the sample has no spread.
    #[must_use]
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.std_dev <= f64::EPSILON {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}

/// Fixed-capacity window of interval volumes, oldest evicted first.
#[derive(Debug, Clone)]
pub struct VolumeWindow {
    values: VecDeque<u64>,
    capacity: usize,
}

impl VolumeWindow {
    /// Create an empty window. Capacity is clamped to at least one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, value: u64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the window holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Mean and standard deviation, or `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> Option<VolumeStats> {
        if self.values.is_empty() {
            return None;
        }
        let n = self.values.len() as f64;
        let mean = self.values.iter().map(|&v| v as f64).sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Some(VolumeStats {
            samples: self.values.len(),
            mean,
            std_dev: variance.sqrt(),
        })
    }
}

// =============================================================================
// Symbol State
// =============================================================================

/// A bid match that has not yet been followed by a halt alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingBidMatch {
    /// Bid price of the match.
    pub bid_price: Decimal,
    /// When the match was alerted.
    pub at: DateTime<Utc>,
}

/// Everything the evaluator remembers about one symbol.
#[derive(Debug, Clone)]
pub struct SymbolState {
    last: Option<QuoteSnapshot>,
    volumes: VolumeWindow,
    cooldowns: HashMap<AlertKind, DateTime<Utc>>,
    pending_bid_match: Option<PendingBidMatch>,
    unusual_activity_day: Option<NaiveDate>,
    seen: Option<Sighting>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sighting {
    at: DateTime<Utc>,
    day: NaiveDate,
}

impl SymbolState {
    /// Create empty state with a volume window of `window` samples.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            last: None,
            volumes: VolumeWindow::new(window),
            cooldowns: HashMap::new(),
            pending_bid_match: None,
            unusual_activity_day: None,
            seen: None,
        }
    }

    /// Whether the symbol was last seen on `day`, at most `max_gap` before `now`.
    #[must_use]
    pub fn is_fresh(&self, day: NaiveDate, now: DateTime<Utc>, max_gap: Duration) -> bool {
        self.seen
            .is_some_and(|seen| seen.day == day && now - seen.at <= max_gap)
    }

    /// Whether the symbol was seen on local `day`.
    #[must_use]
    pub fn seen_on(&self, day: NaiveDate) -> bool {
        self.seen.is_some_and(|seen| seen.day == day)
    }

    /// When the symbol was last seen.
    #[must_use]
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.seen.map(|seen| seen.at)
    }

    /// Record a sighting at `now` on local `day`.
    ///
    /// A new day drops the volume baseline and any outstanding bid match.
    pub fn mark_seen(&mut self, now: DateTime<Utc>, day: NaiveDate) {
        if self.seen.is_some_and(|seen| seen.day != day) {
            self.volumes.clear();
            self.pending_bid_match = None;
        }
        self.seen = Some(Sighting { at: now, day });
    }

    /// The most recent snapshot.
    #[must_use]
    pub const fn last(&self) -> Option<&QuoteSnapshot> {
        self.last.as_ref()
    }

    /// Replace the latest snapshot, returning the previous one.
    pub fn advance(&mut self, snapshot: QuoteSnapshot) -> Option<QuoteSnapshot> {
        self.last.replace(snapshot)
    }

    /// Interval volume history.
    #[must_use]
    pub const fn volumes(&self) -> &VolumeWindow {
        &self.volumes
    }

    /// Mutable interval volume history.
    pub const fn volumes_mut(&mut self) -> &mut VolumeWindow {
        &mut self.volumes
    }

    /// Whether `kind` alerted within `cooldown` before `now`.
    #[must_use]
    pub fn in_cooldown(&self, kind: AlertKind, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.cooldowns
            .get(&kind)
            .is_some_and(|&last| now - last < cooldown)
    }

    /// Record that `kind` alerted at `now`.
    pub fn mark_alerted(&mut self, kind: AlertKind, now: DateTime<Utc>) {
        self.cooldowns.insert(kind, now);
    }

    /// Outstanding bid match awaiting a halt follow-up.
    #[must_use]
    pub const fn pending_bid_match(&self) -> Option<&PendingBidMatch> {
        self.pending_bid_match.as_ref()
    }

    /// Record a bid match alert.
    pub const fn set_pending_bid_match(&mut self, pending: PendingBidMatch) {
        self.pending_bid_match = Some(pending);
    }

    /// Consume the outstanding bid match.
    pub fn take_pending_bid_match(&mut self) -> Option<PendingBidMatch> {
        self.pending_bid_match.take()
    }

    /// Whether unusual activity already alerted on `day`.
    #[must_use]
    pub fn unusual_activity_alerted_on(&self, day: NaiveDate) -> bool {
        self.unusual_activity_day == Some(day)
    }

    /// Record that unusual activity alerted on `day`.
    pub const fn mark_unusual_activity(&mut self, day: NaiveDate) {
        self.unusual_activity_day = Some(day);
    }
}

// =============================================================================
// Contract Cooldowns
// =============================================================================

/// Last alert time per options contract.
#[derive(Debug, Clone, Default)]
pub struct ContractCooldowns {
    last: HashMap<String, DateTime<Utc>>,
}

impl ContractCooldowns {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `true` and record `now` if `contract` is outside its cooldown.
    ///
    /// Entries older than `cooldown` are pruned on every call.
    pub fn try_mark(&mut self, contract: &str, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last.retain(|_, &mut at| now - at < cooldown);
        if self.last.contains_key(contract) {
            return false;
        }
        self.last.insert(contract.to_string(), now);
        true
    }

    /// Number of contracts currently cooling down.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last.len()
    }

    /// Whether no contract is cooling down.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}

// =============================================================================
// Symbol Store
// =============================================================================

/// Keyed per-symbol state, owned by the scan loop.
#[derive(Debug, Clone)]
pub struct SymbolStore {
    symbols: HashMap<Symbol, SymbolState>,
    window: usize,
}

impl SymbolStore {
    /// Create an empty store whose symbols keep `window` volume samples.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            symbols: HashMap::new(),
            window,
        }
    }

    /// State for a symbol, created on first use.
    pub fn entry(&mut self, symbol: &Symbol) -> &mut SymbolState {
        let window = self.window;
        self.symbols
            .entry(symbol.clone())
            .or_insert_with(|| SymbolState::new(window))
    }

    /// State for a symbol, if tracked.
    #[must_use]
    pub fn get(&self, symbol: &Symbol) -> Option<&SymbolState> {
        self.symbols.get(symbol)
    }

    /// Number of tracked symbols.
    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no symbols are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Latest snapshot of every symbol seen on `day` within `max_gap` of `now`.
    pub fn fresh_snapshots(
        &self,
        day: NaiveDate,
        now: DateTime<Utc>,
        max_gap: Duration,
    ) -> impl Iterator<Item = &QuoteSnapshot> {
        self.symbols
            .values()
            .filter(move |state| state.is_fresh(day, now, max_gap))
            .filter_map(SymbolState::last)
    }

    /// Drop symbols not seen within `idle` of `now` on `day`, returning how
    /// many were removed.
    ///
    /// A symbol seen today that still owes a halt follow-up or carries
    /// today's unusual activity flag is kept until the day rolls over.
    pub fn evict_idle(&mut self, day: NaiveDate, now: DateTime<Utc>, idle: Duration) -> usize {
        let before = self.symbols.len();
        self.symbols.retain(|_, state| {
            state.is_fresh(day, now, idle)
                || (state.seen_on(day)
                    && (state.pending_bid_match.is_some()
                        || state.unusual_activity_alerted_on(day)))
        });
        before - self.symbols.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
