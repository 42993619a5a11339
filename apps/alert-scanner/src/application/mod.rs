//! Application Layer - Use cases and port definitions.
//!
//! The scan loop drives the domain rules through the ports defined here;
//! infrastructure supplies the adapters.

/// Port interfaces for market data, alert delivery and time.
pub mod ports;

/// The scan loop, its scheduler and shared status.
pub mod services;
