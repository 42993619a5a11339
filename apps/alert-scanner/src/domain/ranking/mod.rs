//! Top Gainers Ranking
//!
//! Orders tracked symbols by percentage change against the previous close.
//! Ordering is deterministic: change descending, then symbol ascending.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::snapshot::{QuoteSnapshot, Symbol};

/// Maximum entries in a top gainers summary.
pub const TOP_GAINERS_LIMIT: usize = 10;

/// One ranked symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GainerEntry {
    /// 1-based rank.
    pub rank: usize,
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Last traded price.
    pub last_price: Decimal,
    /// Percentage change against the previous close.
    pub change_percent: Decimal,
}

/// Rank snapshots by percentage change, keeping at most `limit` entries.
///
/// Snapshots with a zero previous close are skipped.
pub fn rank_gainers<'a>(
    snapshots: impl IntoIterator<Item = &'a QuoteSnapshot>,
    limit: usize,
) -> Vec<GainerEntry> {
    let mut scored: Vec<(&QuoteSnapshot, Decimal)> = snapshots
        .into_iter()
        .filter_map(|s| s.change_percent().map(|pct| (s, pct)))
        .collect();

    scored.sort_by(|(a, pa), (b, pb)| compare(pa, &a.symbol, pb, &b.symbol));
    scored.truncate(limit);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (snapshot, pct))| GainerEntry {
            rank: i + 1,
            symbol: snapshot.symbol.clone(),
            last_price: snapshot.last_price,
            change_percent: pct.round_dp(2),
        })
        .collect()
}

fn compare(pa: &Decimal, sa: &Symbol, pb: &Decimal, sb: &Symbol) -> Ordering {
    pb.cmp(pa).then_with(|| sa.cmp(sb))
}
