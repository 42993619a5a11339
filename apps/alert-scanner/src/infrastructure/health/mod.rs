//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, scan status reporting, and Prometheus metrics.
//! Used by container orchestrators and monitoring systems.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (loop running, last fetch ok)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{ScanPhase, ScanStatus, ScanStatusSnapshot};
use crate::infrastructure::metrics::get_metrics_handle;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Scanner version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Gate state.
    pub gate: GateInfo,
    /// Current scan phase.
    pub phase: ScanPhase,
    /// Time of the last successful snapshot fetch.
    pub last_fetch_ok_at: Option<DateTime<Utc>>,
    /// Most recent fetch error, if the last fetch failed.
    pub last_error: Option<String>,
    /// Running totals.
    pub counters: Counters,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Loop running and the last fetch succeeded.
    Healthy,
    /// Loop running but the last fetch failed.
    Degraded,
    /// Loop stopped.
    Unhealthy,
}

/// Gate state.
#[derive(Debug, Clone, Serialize)]
pub struct GateInfo {
    /// Whether the last check found the gate open.
    pub open: bool,
    /// Why the gate was closed.
    pub closed_reason: Option<&'static str>,
}

/// Running totals.
#[derive(Debug, Clone, Serialize)]
pub struct Counters {
    /// Scan ticks.
    pub scans: u64,
    /// Alerts delivered.
    pub alerts_sent: u64,
    /// Failed fetches.
    pub fetch_failures: u64,
    /// Failed deliveries.
    pub dispatch_failures: u64,
    /// Rejected upstream rows.
    pub rows_rejected: u64,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    scan_status: Arc<ScanStatus>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, scan_status: Arc<ScanStatus>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            scan_status,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

fn router(state: Arc<HealthServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let snapshot = state.scan_status.snapshot();

    if determine_health_status(&snapshot) == HealthStatus::Healthy {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> Response {
    let Some(handle) = get_metrics_handle() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response();
    };
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        handle.render(),
    )
        .into_response()
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let snapshot = state.scan_status.snapshot();

    HealthResponse {
        status: determine_health_status(&snapshot),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        gate: GateInfo {
            open: snapshot.gate_open,
            closed_reason: snapshot.closed_reason,
        },
        phase: snapshot.phase,
        last_fetch_ok_at: snapshot.last_fetch_ok_at,
        last_error: snapshot.last_error,
        counters: Counters {
            scans: snapshot.scans,
            alerts_sent: snapshot.alerts_sent,
            fetch_failures: snapshot.fetch_failures,
            dispatch_failures: snapshot.dispatch_failures,
            rows_rejected: snapshot.rows_rejected,
        },
    }
}

fn determine_health_status(snapshot: &ScanStatusSnapshot) -> HealthStatus {
    match snapshot.phase {
        ScanPhase::Starting | ScanPhase::Stopped | ScanPhase::Failed => HealthStatus::Unhealthy,
        _ if snapshot.last_fetch_failed => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
