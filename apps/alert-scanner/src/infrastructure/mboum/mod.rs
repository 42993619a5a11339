//! Mboum Market Data Adapter
//!
//! REST client for the Mboum API implementing [`MarketDataPort`].
//!
//! - `GET /v1/screener` selects the symbol universe (day gainers)
//! - `GET /v1/markets/quote` supplies full quotes for that universe plus the
//!   watchlist
//! - `GET /v1/markets/options/unusual-options-activity` supplies options rows
//!
//! Every response wraps its rows in a `{"body": [...]}` envelope.
//!
//! [`MarketDataPort`]: crate::application::ports::MarketDataPort

mod client;
mod error;
mod messages;

pub use client::MboumClient;
pub use error::MboumError;
pub use messages::{Envelope, OptionsRow, QuoteRow, ScreenerRow};
