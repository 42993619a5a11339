//! Telegram Alert Delivery
//!
//! Sends alert text through the Telegram Bot API `sendMessage` method.
//! When no bot token is configured the scanner falls back to
//! [`LogDispatcher`], which only writes alerts to the log.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::ports::{AlertDispatchPort, DispatchError};
use crate::infrastructure::config::{RetrySettings, TelegramSettings};
use crate::infrastructure::http::{Backoff, ErrorCategory, categorize_status, retry_after};

// =============================================================================
// Errors
// =============================================================================

/// Errors from the Telegram adapter.
#[derive(Debug, Error, Clone)]
pub enum TelegramError {
    /// Request could not be sent.
    #[error("network error: {0}")]
    Network(String),

    /// Bot API rejected the message.
    #[error("Telegram API error {status}: {description}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// `description` from the error body, or the raw body.
        description: String,
    },

    /// Retries exhausted.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Retries made before giving up.
        attempts: u32,
    },

    /// Client could not be constructed.
    #[error("invalid Telegram configuration: {0}")]
    Config(String),
}

impl From<TelegramError> for DispatchError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Network(message) | TelegramError::Config(message) => {
                Self::Connection { message }
            }
            TelegramError::MaxRetriesExceeded { attempts } => Self::Connection {
                message: format!("max retries exceeded after {attempts} attempts"),
            },
            TelegramError::Api {
                status,
                description,
            } => Self::Rejected {
                status,
                message: description,
            },
        }
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

/// Flood control hints sent alongside a 429.
#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

impl ApiErrorBody {
    fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }

    fn retry_after(&self) -> Option<Duration> {
        self.parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .map(Duration::from_secs)
    }
}

// =============================================================================
// Telegram Dispatcher
// =============================================================================

/// Alert dispatcher backed by the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramDispatcher {
    client: Client,
    url: String,
    chat_id: String,
    retry: RetrySettings,
}

impl TelegramDispatcher {
    /// Create a dispatcher from settings.
    ///
    /// # Errors
    ///
    /// Returns `TelegramError::Config` for an empty token or chat id, or if
    /// the HTTP client cannot be built.
    pub fn new(settings: &TelegramSettings, retry: &RetrySettings) -> Result<Self, TelegramError> {
        if settings.bot_token.trim().is_empty() {
            return Err(TelegramError::Config("bot token is empty".to_string()));
        }
        if settings.chat_id.trim().is_empty() {
            return Err(TelegramError::Config("chat id is empty".to_string()));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| TelegramError::Config(e.to_string()))?;

        Ok(Self {
            client,
            url: format!(
                "{}/bot{}/sendMessage",
                settings.base_url.trim_end_matches('/'),
                settings.bot_token.trim()
            ),
            chat_id: settings.chat_id.trim().to_string(),
            retry: retry.clone(),
        })
    }

    /// Send one message, retrying on network errors, 429 and 5xx.
    ///
    /// # Errors
    ///
    /// Returns `TelegramError` once the message is rejected or retries run out.
    pub async fn send(&self, text: &str) -> Result<(), TelegramError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
        };
        let mut backoff = Backoff::new(&self.retry);

        loop {
            let response = match self.client.post(&self.url).json(&body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_delay() {
                        tracing::warn!(
                            error = %e.without_url(),
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt(),
                            "Telegram network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if backoff.attempt() == 0 {
                        return Err(TelegramError::Network(e.without_url().to_string()));
                    }
                    return Err(TelegramError::MaxRetriesExceeded {
                        attempts: backoff.attempt(),
                    });
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(());
            }

            let header_retry_after = retry_after(response.headers());
            let raw = response.text().await.unwrap_or_default();
            let error_body = ApiErrorBody::parse(&raw);
            let retry_after = header_retry_after.max(error_body.retry_after());
            let description = error_body.description.unwrap_or(raw);

            match categorize_status(status) {
                ErrorCategory::RateLimited | ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_delay() {
                        let delay = retry_after.map_or(delay, |after| after.max(delay));
                        tracing::warn!(
                            status = status.as_u16(),
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt(),
                            "Telegram send failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
                ErrorCategory::NonRetryable => {
                    if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
                        tracing::error!(status = status.as_u16(), "Telegram bot token rejected");
                    }
                }
            }
            return Err(TelegramError::Api {
                status: status.as_u16(),
                description,
            });
        }
    }
}

#[async_trait]
impl AlertDispatchPort for TelegramDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        self.send(text).await.map_err(DispatchError::from)
    }
}

// =============================================================================
// Log Dispatcher
// =============================================================================

/// Dispatcher that writes alerts to the log instead of a chat.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatchPort for LogDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        tracing::info!(alert = text, "Alert (log only)");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
