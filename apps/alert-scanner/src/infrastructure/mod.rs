//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Holiday calendar loading.
pub mod calendar;

/// Configuration loaded from the environment.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Retry and backoff shared by the HTTP adapters.
pub mod http;

/// Mboum market data adapter.
pub mod mboum;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Telegram alert delivery.
pub mod telegram;

/// OpenTelemetry tracing integration.
pub mod telemetry;
