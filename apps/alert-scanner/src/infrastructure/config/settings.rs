//! Scanner Configuration Settings
//!
//! Configuration types for the alert scanner, loaded from environment
//! variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;

use crate::domain::evaluator::Watchlist;
use crate::domain::market_hours::{DEFAULT_TIMEZONE, OperatingWindow};

/// Default Mboum API base URL.
pub const DEFAULT_MBOUM_BASE_URL: &str = "https://api.mboum.com";

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_BASE_URL: &str = "https://api.telegram.org";

/// Mboum API credentials.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(api_key: String) -> Self {
        Self { api_key }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Which quote fields mark a trading halt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HaltSignal {
    /// Explicit halt flag or a trading status naming a halt.
    #[default]
    Status,
    /// `tradeable: false`, for feeds where that flag tracks halts.
    Tradeable,
    /// Never report halts.
    Off,
}

impl FromStr for HaltSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "status" => Ok(Self::Status),
            "tradeable" => Ok(Self::Tradeable),
            "off" | "none" => Ok(Self::Off),
            other => Err(format!("unknown halt signal {other:?} (status, tradeable, off)")),
        }
    }
}

/// Market data API settings.
#[derive(Debug, Clone)]
pub struct MboumSettings {
    /// API credentials.
    pub credentials: Credentials,
    /// API base URL.
    pub base_url: String,
    /// Screener rows per poll.
    pub screener_limit: u32,
    /// Quote fields that mark a halt.
    pub halt_signal: HaltSignal,
}

/// Telegram destination.
#[derive(Clone)]
pub struct TelegramSettings {
    /// Bot token.
    pub bot_token: String,
    /// Destination chat id.
    pub chat_id: String,
    /// API base URL.
    pub base_url: String,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &"[REDACTED]")
            .field("chat_id", &self.chat_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Holiday calendar sources.
#[derive(Debug, Clone, Default)]
pub struct CalendarSettings {
    /// Dates added to the calendar.
    pub extra_holidays: Vec<NaiveDate>,
    /// JSON file replacing the built-in table.
    pub holiday_file: Option<PathBuf>,
}

/// Cadences and timeouts.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    /// Quote scan cadence.
    pub scan_interval: Duration,
    /// Unusual options cadence.
    pub options_interval: Duration,
    /// Top gainers cadence.
    pub gainers_interval: Duration,
    /// Timeout for one market data call.
    pub fetch_timeout: Duration,
    /// Timeout for one dispatch call.
    pub dispatch_timeout: Duration,
    /// Closed scan ticks between heartbeat notices (0 = never).
    pub heartbeat_ticks: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(10),
            options_interval: Duration::from_secs(120),
            gainers_interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(8),
            dispatch_timeout: Duration::from_secs(5),
            heartbeat_ticks: 30,
        }
    }
}

/// Retry settings shared by the HTTP adapters.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Initial retry delay.
    pub initial_delay: Duration,
    /// Maximum retry delay.
    pub max_delay: Duration,
    /// Delay multiplier for exponential backoff.
    pub multiplier: f64,
    /// Retries after the first attempt.
    pub max_retries: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_retries: 2,
        }
    }
}

impl RetrySettings {
    /// Reject policies the backoff cannot follow.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when the multiplier is not a
    /// finite number of at least 1.0 or the maximum delay is below the
    /// initial delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "SCANNER_RETRY_DELAY_MULTIPLIER",
                &self.multiplier.to_string(),
                "must be a finite number of at least 1.0",
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::invalid(
                "SCANNER_RETRY_DELAY_MAX_MS",
                &self.max_delay.as_millis().to_string(),
                format!(
                    "must not be below SCANNER_RETRY_DELAY_INITIAL_MS ({}ms)",
                    self.initial_delay.as_millis()
                ),
            ));
        }
        Ok(())
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check and metrics HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Market data API.
    pub mboum: MboumSettings,
    /// Chat destination; `None` logs alerts instead.
    pub telegram: Option<TelegramSettings>,
    /// Operating window.
    pub window: OperatingWindow,
    /// Holiday calendar sources.
    pub calendar: CalendarSettings,
    /// Large sale watchlist.
    pub watchlist: Watchlist,
    /// Cadences and timeouts.
    pub schedule: ScheduleSettings,
    /// Per-symbol alert cooldown.
    pub alert_cooldown: Duration,
    /// HTTP retry policy.
    pub retry: RetrySettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl ScannerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ScannerConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);

        let api_key = env
            .get("MBOUM_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("MBOUM_API_KEY".to_string()))?;
        if api_key.is_empty() {
            return Err(ConfigError::EmptyValue("MBOUM_API_KEY".to_string()));
        }

        let mboum = MboumSettings {
            credentials: Credentials::new(api_key),
            base_url: env
                .get("MBOUM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_MBOUM_BASE_URL.to_string()),
            screener_limit: env.parse_u32("MBOUM_SCREENER_LIMIT", 25),
            halt_signal: match env.get("MBOUM_HALT_SIGNAL") {
                Some(value) => value
                    .parse()
                    .map_err(|e: String| ConfigError::invalid("MBOUM_HALT_SIGNAL", &value, e))?,
                None => HaltSignal::default(),
            },
        };

        let telegram = match (env.get("TELEGRAM_BOT_TOKEN"), env.get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) if !bot_token.is_empty() && !chat_id.is_empty() => {
                Some(TelegramSettings {
                    bot_token,
                    chat_id,
                    base_url: env
                        .get("TELEGRAM_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_TELEGRAM_BASE_URL.to_string()),
                })
            }
            _ => None,
        };

        let timezone = match env.get("SCANNER_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| ConfigError::invalid("SCANNER_TIMEZONE", &name, e))?,
            None => DEFAULT_TIMEZONE,
        };
        let default_window = OperatingWindow::default();
        let start = env.parse_time("SCANNER_WINDOW_START", default_window.start())?;
        let end = env.parse_time("SCANNER_WINDOW_END", default_window.end())?;
        let window = OperatingWindow::new(timezone, start, end).map_err(|e| {
            ConfigError::invalid("SCANNER_WINDOW_END", &end.format("%H:%M").to_string(), e)
        })?;

        let calendar = CalendarSettings {
            extra_holidays: env.parse_dates("SCANNER_HOLIDAYS")?,
            holiday_file: env.get("SCANNER_HOLIDAY_FILE").map(PathBuf::from),
        };

        let watchlist = env
            .get("SCANNER_WATCHLIST")
            .map(|list| Watchlist::parse(&list))
            .unwrap_or_default();

        let defaults = ScheduleSettings::default();
        let schedule = ScheduleSettings {
            scan_interval: env
                .parse_nonzero_secs("SCANNER_SCAN_INTERVAL_SECS", defaults.scan_interval)?,
            options_interval: env
                .parse_nonzero_secs("SCANNER_OPTIONS_INTERVAL_SECS", defaults.options_interval)?,
            gainers_interval: env
                .parse_nonzero_secs("SCANNER_GAINERS_INTERVAL_SECS", defaults.gainers_interval)?,
            fetch_timeout: env
                .parse_nonzero_secs("SCANNER_FETCH_TIMEOUT_SECS", defaults.fetch_timeout)?,
            dispatch_timeout: env
                .parse_nonzero_secs("SCANNER_DISPATCH_TIMEOUT_SECS", defaults.dispatch_timeout)?,
            heartbeat_ticks: env.parse_u32("SCANNER_HEARTBEAT_TICKS", defaults.heartbeat_ticks),
        };

        let retry = RetrySettings {
            initial_delay: env.parse_duration_millis(
                "SCANNER_RETRY_DELAY_INITIAL_MS",
                RetrySettings::default().initial_delay,
            ),
            max_delay: env.parse_duration_millis(
                "SCANNER_RETRY_DELAY_MAX_MS",
                RetrySettings::default().max_delay,
            ),
            multiplier: env.parse_f64(
                "SCANNER_RETRY_DELAY_MULTIPLIER",
                RetrySettings::default().multiplier,
            ),
            max_retries: env.parse_u32("SCANNER_MAX_RETRIES", RetrySettings::default().max_retries),
        };
        retry.validate()?;

        Ok(Self {
            mboum,
            telegram,
            window,
            calendar,
            watchlist,
            schedule,
            alert_cooldown: env
                .parse_duration_secs("SCANNER_ALERT_COOLDOWN_SECS", Duration::from_secs(300)),
            retry,
            server: ServerSettings {
                health_port: env
                    .parse_u16("SCANNER_HEALTH_PORT", ServerSettings::default().health_port),
            },
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// Parse failure.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string())
    }

    fn parse_u16(&self, key: &str, default: u16) -> u16 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_f64(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn parse_duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn parse_duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }

    fn parse_nonzero_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let value = self.parse_duration_secs(key, default);
        if value.is_zero() {
            return Err(ConfigError::invalid(key, "0", "must be at least one second"));
        }
        Ok(value)
    }

    fn parse_time(&self, key: &str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        NaiveTime::parse_from_str(&value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"))
            .map_err(|e| ConfigError::invalid(key, &value, e))
    }

    fn parse_dates(&self, key: &str) -> Result<Vec<NaiveDate>, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(Vec::new());
        };
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| ConfigError::invalid(key, s, e))
            })
            .collect()
    }
}
