//! Mboum Wire Types
//!
//! JSON shapes returned by the Mboum REST API. Numeric fields arrive as JSON
//! numbers or as strings (sometimes with thousands separators or a trailing
//! `%`), so every numeric field goes through a lenient decimal parser.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"meta": {...}, "body": [
//!   {"symbol": "NVR", "bid": 2500.0, "bidSize": 20, "regularMarketPrice": 2510.5,
//!    "regularMarketVolume": 41000, "regularMarketPreviousClose": 2400.0,
//!    "averageDailyVolume3Month": 22000, "tradeable": true, "tradingStatus": "Halted"}
//! ]}
//! ```
//!
//! `tradeable` is `false` for ordinary listed equities on several feeds, so
//! halts come from `halted`/`isHalted` or a `tradingStatus` naming a halt
//! unless [`HaltSignal::Tradeable`] is configured.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer};

use crate::application::ports::SnapshotResult;
use crate::domain::options::{OptionType, OptionsActivity};
use crate::domain::snapshot::{QuoteSnapshot, Symbol};
use crate::infrastructure::config::HaltSignal;

// =============================================================================
// Envelope
// =============================================================================

/// Response envelope: rows live under `body`.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    /// Rows; a missing or null body decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: Vec<T>,
}

// =============================================================================
// Screener
// =============================================================================

/// One screener row. Only the symbol is needed; quotes are fetched separately.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreenerRow {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: String,
}

// =============================================================================
// Quote
// =============================================================================

/// One quote row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRow {
    /// Ticker symbol.
    #[serde(default)]
    pub symbol: String,
    /// Best bid.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub bid: Option<Decimal>,
    /// Best bid size.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub bid_size: Option<Decimal>,
    /// Best ask.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ask: Option<Decimal>,
    /// Best ask size.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ask_size: Option<Decimal>,
    /// Last price.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub regular_market_price: Option<Decimal>,
    /// Session volume.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub regular_market_volume: Option<Decimal>,
    /// Previous session close.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub regular_market_previous_close: Option<Decimal>,
    /// Average daily volume.
    #[serde(
        default,
        rename = "averageDailyVolume3Month",
        alias = "averageDailyVolume10Day",
        deserialize_with = "lenient_decimal"
    )]
    pub average_daily_volume: Option<Decimal>,
    /// Whether the symbol can be traded through the data vendor.
    #[serde(default)]
    pub tradeable: Option<bool>,
    /// Explicit halt flag.
    #[serde(default, alias = "isHalted", alias = "tradingHalted")]
    pub halted: Option<bool>,
    /// Exchange trading status, e.g. "Halted" or "Normal".
    #[serde(default, alias = "securityStatus")]
    pub trading_status: Option<String>,
}

impl QuoteRow {
    /// Validate into a domain snapshot.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` when a required field is missing or invalid.
    pub fn into_snapshot(self, observed_at: DateTime<Utc>, halt_signal: HaltSignal) -> SnapshotResult {
        let halted = self.is_halted(halt_signal);
        QuoteSnapshot::builder(self.symbol.as_str())
            .bid_price(self.bid)
            .bid_size(self.bid_size.and_then(to_count))
            .ask(self.ask, self.ask_size.and_then(to_count))
            .last_price(self.regular_market_price)
            .volume(self.regular_market_volume.and_then(to_count))
            .previous_close(self.regular_market_previous_close)
            .average_volume(self.average_daily_volume.and_then(to_count))
            .halted(halted)
            .observed_at(observed_at)
            .build()
    }

    fn is_halted(&self, signal: HaltSignal) -> bool {
        match signal {
            HaltSignal::Status => {
                self.halted == Some(true)
                    || self
                        .trading_status
                        .as_deref()
                        .is_some_and(|s| s.to_ascii_lowercase().contains("halt"))
            }
            HaltSignal::Tradeable => self.tradeable == Some(false),
            HaltSignal::Off => false,
        }
    }
}

// =============================================================================
// Unusual Options Activity
// =============================================================================

/// One unusual options activity row.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsRow {
    /// Contract identifier.
    #[serde(default)]
    pub symbol: String,
    /// Underlying ticker.
    #[serde(default, alias = "underlyingSymbol")]
    pub base_symbol: String,
    /// "Call" or "Put".
    #[serde(default, alias = "type")]
    pub symbol_type: String,
    /// Strike price.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub strike_price: Option<Decimal>,
    /// Expiration date, `YYYY-MM-DD` or `MM/DD/YY`.
    #[serde(default)]
    pub expiration_date: String,
    /// Contracts traded.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume: Option<Decimal>,
    /// Open interest.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub open_interest: Option<Decimal>,
    /// Last trade price.
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub last_price: Option<Decimal>,
}

impl OptionsRow {
    /// Convert to a domain row, or `None` when a required field is unusable.
    #[must_use]
    pub fn into_activity(self) -> Option<OptionsActivity> {
        let underlying = Symbol::new(&self.base_symbol);
        if underlying.is_empty() || self.symbol.trim().is_empty() {
            return None;
        }
        Some(OptionsActivity {
            underlying,
            contract: self.symbol.trim().to_string(),
            option_type: OptionType::parse(&self.symbol_type)?,
            strike: self.strike_price?,
            expiration: parse_expiration(&self.expiration_date)?,
            volume: self.volume.and_then(to_count)?,
            open_interest: self.open_interest.and_then(to_count).unwrap_or(0),
            last_price: self.last_price,
        })
    }
}

fn parse_expiration(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// =============================================================================
// Lenient Parsing
// =============================================================================

fn to_count(value: Decimal) -> Option<u64> {
    if value.is_sign_negative() {
        return None;
    }
    value.trunc().to_u64()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
                .or_else(|| n.as_f64().and_then(Decimal::from_f64))
        }
        Some(serde_json::Value::String(s)) => {
            let cleaned: String = s
                .trim()
                .trim_end_matches('%')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    use super::*;
    use crate::domain::snapshot::SnapshotError;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 14, 0, 0).unwrap()
    }

    #[test]
    fn decodes_quote_envelope() {
        let json = r#"{"meta": {"count": 1}, "body": [{
            "symbol": "nvr", "bid": 2500.0, "bidSize": 20, "ask": "2,501.25",
            "askSize": null, "regularMarketPrice": 2510.5,
            "regularMarketVolume": "41,000", "regularMarketPreviousClose": 2400,
            "averageDailyVolume3Month": 22000, "tradeable": false
        }]}"#;
        let envelope: Envelope<QuoteRow> = serde_json::from_str(json).unwrap();
        let snapshot = envelope.body[0]
            .clone()
            .into_snapshot(now(), HaltSignal::Status)
            .unwrap();
        assert_eq!(snapshot.symbol.as_str(), "NVR");
        assert_eq!(snapshot.bid_price, dec!(2500));
        assert_eq!(snapshot.bid_size, 20);
        assert_eq!(snapshot.ask_price, Some(dec!(2501.25)));
        assert_eq!(snapshot.ask_size, None);
        assert_eq!(snapshot.volume, 41_000);
        assert_eq!(snapshot.average_volume, Some(22_000));
        assert!(!snapshot.halted);
        assert_eq!(snapshot.observed_at, now());
    }

    fn halt_row(json: &str) -> QuoteRow {
        let mut row: QuoteRow = serde_json::from_str(json).unwrap();
        row.symbol = "HLT".into();
        row.bid = Some(dec!(10));
        row.bid_size = Some(dec!(100));
        row.regular_market_price = Some(dec!(10));
        row.regular_market_volume = Some(dec!(0));
        row.regular_market_previous_close = Some(dec!(10));
        row
    }

    #[test]
    fn untradeable_equity_is_not_halted_by_default() {
        let row = halt_row(r#"{"tradeable": false, "tradingStatus": "Normal"}"#);
        let snapshot = row.clone().into_snapshot(now(), HaltSignal::Status).unwrap();
        assert!(!snapshot.halted);
        let snapshot = row.into_snapshot(now(), HaltSignal::Tradeable).unwrap();
        assert!(snapshot.halted);
    }

    #[test_case(r#"{"isHalted": true}"# ; "flag")]
    #[test_case(r#"{"tradingStatus": "Trading Halted"}"# ; "status")]
    #[test_case(r#"{"securityStatus": "HALT"}"# ; "security status")]
    fn explicit_halt_fields(json: &str) {
        let snapshot = halt_row(json).into_snapshot(now(), HaltSignal::Status).unwrap();
        assert!(snapshot.halted);
    }

    #[test]
    fn halt_signal_off_ignores_everything() {
        let row = halt_row(r#"{"isHalted": true, "tradeable": false}"#);
        let snapshot = row.into_snapshot(now(), HaltSignal::Off).unwrap();
        assert!(!snapshot.halted);
    }

    #[test]
    fn missing_bid_rejected() {
        let row: QuoteRow = serde_json::from_str(
            r#"{"symbol": "AAPL", "regularMarketPrice": 230.1,
                "regularMarketVolume": 100, "regularMarketPreviousClose": 229}"#,
        )
        .unwrap();
        assert!(matches!(
            row.into_snapshot(now(), HaltSignal::default()),
            Err(SnapshotError::MissingField { field: "bid_price", .. })
        ));
    }

    #[test]
    fn null_body_is_empty() {
        let envelope: Envelope<ScreenerRow> = serde_json::from_str(r#"{"body": null}"#).unwrap();
        assert!(envelope.body.is_empty());
        let envelope: Envelope<ScreenerRow> = serde_json::from_str("{}").unwrap();
        assert!(envelope.body.is_empty());
    }

    #[test]
    fn decodes_options_row() {
        let row: OptionsRow = serde_json::from_str(
            r#"{"symbol": "AMD|20261120|150.00P", "baseSymbol": "AMD", "symbolType": "Put",
                "strikePrice": "150.00", "expirationDate": "11/20/26",
                "volume": "5,000", "openInterest": "1,200", "lastPrice": "3.45",
                "volumeOpenInterestRatio": "4.17"}"#,
        )
        .unwrap();
        let activity = row.into_activity().unwrap();
        assert_eq!(activity.underlying.as_str(), "AMD");
        assert_eq!(activity.option_type, OptionType::Put);
        assert_eq!(activity.strike, dec!(150.00));
        assert_eq!(activity.expiration, NaiveDate::from_ymd_opt(2026, 11, 20).unwrap());
        assert_eq!(activity.volume, 5_000);
        assert_eq!(activity.open_interest, 1_200);
    }

    #[test]
    fn unusable_options_row_skipped() {
        let row = OptionsRow {
            symbol: "XYZ|bad".into(),
            base_symbol: "XYZ".into(),
            symbol_type: "Straddle".into(),
            ..OptionsRow::default()
        };
        assert!(row.into_activity().is_none());
    }

    #[test]
    fn lenient_numbers() {
        #[derive(Deserialize)]
        struct Wrapper {
            #[serde(default, deserialize_with = "lenient_decimal")]
            v: Option<Decimal>,
        }
        let parse = |json: &str| serde_json::from_str::<Wrapper>(json).unwrap().v;
        assert_eq!(parse(r#"{"v": 12}"#), Some(dec!(12)));
        assert_eq!(parse(r#"{"v": "12.5%"}"#), Some(dec!(12.5)));
        assert_eq!(parse(r#"{"v": "N/A"}"#), None);
        assert_eq!(parse(r#"{"v": true}"#), None);
        assert_eq!(parse("{}"), None);
    }
}
