//! Mboum HTTP client with retry logic.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::error::MboumError;
use super::messages::{Envelope, OptionsRow, QuoteRow, ScreenerRow};
use crate::application::ports::{FetchError, MarketDataPort, SnapshotResult};
use crate::domain::options::OptionsActivity;
use crate::domain::snapshot::Symbol;
use crate::infrastructure::config::{HaltSignal, MboumSettings, RetrySettings};
use crate::infrastructure::http::{Backoff, ErrorCategory, categorize_status, retry_after};

const SCREENER_PATH: &str = "/v1/screener";
const QUOTE_PATH: &str = "/v1/markets/quote";
const UNUSUAL_OPTIONS_PATH: &str = "/v1/markets/options/unusual-options-activity";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Market data adapter for the Mboum REST API.
#[derive(Debug, Clone)]
pub struct MboumClient {
    client: Client,
    api_key: String,
    base_url: String,
    screener_limit: u32,
    halt_signal: HaltSignal,
    retry: RetrySettings,
}

impl MboumClient {
    /// Create a client from settings.
    ///
    /// # Errors
    ///
    /// Returns `MboumError::AuthenticationFailed` for an empty key and
    /// `MboumError::Config` if the HTTP client cannot be built.
    pub fn new(settings: &MboumSettings, retry: &RetrySettings) -> Result<Self, MboumError> {
        if settings.credentials.api_key().trim().is_empty() {
            return Err(MboumError::AuthenticationFailed);
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| MboumError::Config(e.to_string()))?;

        Ok(Self {
            client,
            api_key: settings.credentials.api_key().to_string(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            screener_limit: settings.screener_limit,
            halt_signal: settings.halt_signal,
            retry: retry.clone(),
        })
    }

    /// Symbols from the day-gainers screener.
    ///
    /// # Errors
    ///
    /// Returns `MboumError` if the request fails.
    pub async fn screener_symbols(&self) -> Result<Vec<Symbol>, MboumError> {
        let limit = self.screener_limit.to_string();
        let envelope: Envelope<ScreenerRow> = self
            .get_json(
                SCREENER_PATH,
                &[
                    ("metricType", "overview"),
                    ("filter", "day_gainers"),
                    ("limit", limit.as_str()),
                ],
            )
            .await?;

        Ok(envelope
            .body
            .into_iter()
            .map(|row| Symbol::new(&row.symbol))
            .filter(|symbol| !symbol.is_empty())
            .collect())
    }

    /// Quote rows for `symbols`.
    ///
    /// # Errors
    ///
    /// Returns `MboumError` if the request fails.
    pub async fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<QuoteRow>, MboumError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let tickers = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let envelope: Envelope<QuoteRow> = self
            .get_json(QUOTE_PATH, &[("ticker", tickers.as_str()), ("type", "STOCKS")])
            .await?;
        Ok(envelope.body)
    }

    /// Raw unusual options rows.
    ///
    /// # Errors
    ///
    /// Returns `MboumError` if the request fails.
    pub async fn unusual_options(&self) -> Result<Vec<OptionsRow>, MboumError> {
        let envelope: Envelope<OptionsRow> = self
            .get_json(UNUSUAL_OPTIONS_PATH, &[("type", "STOCKS"), ("page", "1")])
            .await?;
        Ok(envelope.body)
    }

    /// GET with retry on network errors, 429 and 5xx.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MboumError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = Backoff::new(&self.retry);

        loop {
            let request = self
                .client
                .get(&url)
                .header(reqwest::header::AUTHORIZATION, &self.api_key)
                .query(query);

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_delay() {
                        tracing::warn!(
                            path,
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt(),
                            "Mboum network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if backoff.attempt() == 0 {
                        return Err(MboumError::Network(e.to_string()));
                    }
                    return Err(MboumError::MaxRetriesExceeded {
                        attempts: backoff.attempt(),
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| MboumError::Network(e.to_string()))?;
                return serde_json::from_str(&text).map_err(|e| MboumError::JsonParse(e.to_string()));
            }

            let retry_after = retry_after(response.headers());
            let message = response.text().await.unwrap_or_default();

            match categorize_status(status) {
                ErrorCategory::RateLimited | ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_delay() {
                        let delay = retry_after.map_or(delay, |after| after.max(delay));
                        tracing::warn!(
                            path,
                            status = status.as_u16(),
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt(),
                            "Mboum request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(MboumError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }
                ErrorCategory::NonRetryable => {
                    return match status {
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                            Err(MboumError::AuthenticationFailed)
                        }
                        _ => Err(MboumError::Api {
                            status: status.as_u16(),
                            message,
                        }),
                    };
                }
            }
        }
    }
}

/// Screener symbols first, then watchlist symbols not already present.
fn merge_universe(screener: Vec<Symbol>, watchlist: &[Symbol]) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    screener
        .into_iter()
        .chain(watchlist.iter().cloned())
        .filter(|symbol| seen.insert(symbol.clone()))
        .collect()
}

#[async_trait]
impl MarketDataPort for MboumClient {
    async fn fetch_snapshots(&self, watchlist: &[Symbol]) -> Result<Vec<SnapshotResult>, FetchError> {
        let screener = self.screener_symbols().await?;
        let universe = merge_universe(screener, watchlist);
        let rows = self.quotes(&universe).await?;

        let observed_at = Utc::now();
        tracing::debug!(
            universe = universe.len(),
            rows = rows.len(),
            "Fetched Mboum quotes"
        );
        Ok(rows
            .into_iter()
            .map(|row| row.into_snapshot(observed_at, self.halt_signal))
            .collect())
    }

    async fn fetch_options_activity(&self) -> Result<Vec<OptionsActivity>, FetchError> {
        let rows = self.unusual_options().await?;
        let total = rows.len();
        let activity: Vec<OptionsActivity> =
            rows.into_iter().filter_map(OptionsRow::into_activity).collect();

        if activity.len() < total {
            tracing::debug!(
                skipped = total - activity.len(),
                "Skipped unusable options rows"
            );
        }
        Ok(activity)
    }
}
