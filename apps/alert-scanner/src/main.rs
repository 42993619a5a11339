//! Alert Scanner Binary
//!
//! Starts the market-hours alert scanner.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin alert-scanner
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `MBOUM_API_KEY`: Mboum API key
//!
//! ## Optional
//! - `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`: Chat destination (unset: log only)
//! - `SCANNER_WATCHLIST`: Comma-separated large sale watchlist
//! - `SCANNER_TIMEZONE`: Gate reference zone (default: America/New_York)
//! - `SCANNER_WINDOW_START` / `SCANNER_WINDOW_END`: Window (default: 06:00 / 18:00)
//! - `SCANNER_HOLIDAYS`: Extra holiday dates, comma-separated `YYYY-MM-DD`
//! - `SCANNER_HOLIDAY_FILE`: JSON holiday list replacing the built-in table
//! - `SCANNER_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `MBOUM_HALT_SIGNAL`: Quote fields marking a halt: status, tradeable, off (default: status)
//!
//! The process exits non-zero after sending a crash notice if the scan loop
//! dies on its own.
//! - `OTEL_ENABLED`: Export traces over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use alert_scanner::infrastructure::health::{HealthServer, HealthServerState};
use alert_scanner::infrastructure::telemetry;
use alert_scanner::{
    AlertDispatchPort, AlertEvaluator, ClockGate, EvaluatorConfig, LogDispatcher, MboumClient,
    ScanExit, ScanLoop, ScanPorts, ScannerConfig, SystemClock, TelegramDispatcher, init_metrics,
    load_calendar, report_crash, supervise,
};
use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Scan intervals after which a symbol's previous snapshot no longer starts
/// an interval.
const SNAPSHOT_GAP_SCANS: u32 = 6;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OTLP)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting alert scanner");

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed");
    }

    let config = ScannerConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let calendar = load_calendar(&config.calendar);
    let gate = ClockGate::new(config.window, calendar);

    let market_data = Arc::new(
        MboumClient::new(&config.mboum, &config.retry).context("failed to build Mboum client")?,
    );

    let dispatcher: Arc<dyn AlertDispatchPort> = match &config.telegram {
        Some(settings) => Arc::new(
            TelegramDispatcher::new(settings, &config.retry)
                .context("failed to build Telegram dispatcher")?,
        ),
        None => {
            tracing::warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set, alerts are logged only");
            Arc::new(LogDispatcher)
        }
    };

    let defaults = EvaluatorConfig::default();
    let max_snapshot_gap = chrono::Duration::from_std(
        config.schedule.scan_interval * SNAPSHOT_GAP_SCANS,
    )
    .context("SCANNER_SCAN_INTERVAL_SECS out of range")?;
    let evaluator = AlertEvaluator::new(EvaluatorConfig {
        cooldown: chrono::Duration::from_std(config.alert_cooldown)
            .context("SCANNER_ALERT_COOLDOWN_SECS out of range")?,
        max_snapshot_gap,
        idle_eviction: defaults.idle_eviction.max(max_snapshot_gap),
        ..defaults
    });

    let scan_loop = ScanLoop::new(
        ScanPorts {
            market_data,
            dispatcher: Arc::clone(&dispatcher),
            clock: Arc::new(SystemClock),
        },
        gate,
        evaluator,
        config.watchlist.clone(),
        config.schedule.clone(),
    );

    // Initialize health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        scan_loop.status(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    // Spawn health server
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    // Spawn scan loop
    let status = scan_loop.status();
    let scan_handle = tokio::spawn(scan_loop.run(shutdown_token.clone()));

    tracing::info!("Alert scanner ready");

    match supervise(scan_handle, wait_for_signal(), &shutdown_token, SHUTDOWN_TIMEOUT).await {
        ScanExit::Shutdown => {
            tracing::info!("Alert scanner stopped");
            Ok(())
        }
        ScanExit::Crashed(detail) => {
            report_crash(
                dispatcher.as_ref(),
                &status,
                &detail,
                config.schedule.dispatch_timeout,
            )
            .await;
            anyhow::bail!("scan loop crashed: {detail}")
        }
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &ScannerConfig) {
    tracing::info!(
        timezone = %config.window.timezone(),
        window_start = %config.window.start(),
        window_end = %config.window.end(),
        watchlist = config.watchlist.len(),
        telegram = config.telegram.is_some(),
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        mboum_base_url = %config.mboum.base_url,
        screener_limit = config.mboum.screener_limit,
        halt_signal = ?config.mboum.halt_signal,
        schedule = ?config.schedule,
        retry = ?config.retry,
        "Adapter settings"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Block until SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never resolves; the
/// other signal still stops the process.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal_name = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };

    tracing::info!(
        signal = signal_name,
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Shutting down scan loop"
    );
}
