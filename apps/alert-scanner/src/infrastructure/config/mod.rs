//! Configuration Module
//!
//! Configuration loading for the scanner service.

mod settings;

pub use settings::{
    CalendarSettings, ConfigError, Credentials, DEFAULT_MBOUM_BASE_URL, DEFAULT_TELEGRAM_BASE_URL,
    HaltSignal, MboumSettings, RetrySettings, ScannerConfig, ScheduleSettings, ServerSettings,
    TelegramSettings,
};
