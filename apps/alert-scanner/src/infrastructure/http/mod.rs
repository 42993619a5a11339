//! HTTP Retry Support
//!
//! Exponential backoff with jitter and status classification shared by the
//! Mboum and Telegram clients. Retries happen inside the caller's timeout, so
//! the policy is bounded by attempt count rather than wall time.

use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;

use crate::infrastructure::config::RetrySettings;

/// Default jitter as a fraction of the delay.
const DEFAULT_JITTER: f64 = 0.1;

/// Error category for determining retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 429; honour `Retry-After` when present.
    RateLimited,
    /// Transient server or gateway failure.
    Retryable,
    /// Client error or anything else.
    NonRetryable,
}

/// Categorize an HTTP status code for retry handling.
#[must_use]
pub const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Exponential backoff calculator with jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    max_retries: u32,
    current: Duration,
    max: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl Backoff {
    /// Create a backoff from retry settings.
    #[must_use]
    pub const fn new(settings: &RetrySettings) -> Self {
        Self {
            attempt: 0,
            max_retries: settings.max_retries,
            current: settings.initial_delay,
            max: settings.max_delay,
            multiplier: settings.multiplier,
            jitter_factor: DEFAULT_JITTER,
        }
    }

    /// Disable jitter for deterministic delays.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Retries handed out so far.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next retry, or `None` once retries are exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_retries {
            return None;
        }
        self.attempt += 1;

        let delay = self.apply_jitter(self.current);
        let grown = (self.current.as_secs_f64() * self.multiplier).min(self.max.as_secs_f64());
        // NaN or negative growth falls back to the cap.
        self.current = Duration::try_from_secs_f64(grown).unwrap_or(self.max);
        Some(delay)
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}

/// Parse a `Retry-After` header given in seconds.
#[must_use]
pub fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
