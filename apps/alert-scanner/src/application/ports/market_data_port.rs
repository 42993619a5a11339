//! Market Data Port (Driven Port)
//!
//! Interface for polling quote snapshots and the unusual options feed.

use async_trait::async_trait;

use crate::domain::options::OptionsActivity;
use crate::domain::snapshot::{QuoteSnapshot, SnapshotError, Symbol};

/// One upstream row: a validated snapshot or the reason it was rejected.
pub type SnapshotResult = Result<QuoteSnapshot, SnapshotError>;

/// Market data fetch error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Upstream could not be reached.
    #[error("market data connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Upstream answered with a non-success status.
    #[error("market data HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error details.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("market data decode error: {message}")]
    Decode {
        /// Error details.
        message: String,
    },

    /// Upstream rejected the credentials.
    #[error("market data authentication failed")]
    Unauthorized,

    /// The call did not finish in time.
    #[error("market data request timed out")]
    Timeout,
}

impl FetchError {
    /// Label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Unauthorized => "unauthorized",
            Self::Timeout => "timeout",
        }
    }
}

/// Port for polling market data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch the current snapshot universe: the adapter's screener rows plus
    /// quotes for `watchlist`.
    ///
    /// A whole-call failure is `Err`; a row that fails validation is an `Err`
    /// item and does not affect the other rows.
    async fn fetch_snapshots(&self, watchlist: &[Symbol]) -> Result<Vec<SnapshotResult>, FetchError>;

    /// Fetch the unusual options activity feed.
    async fn fetch_options_activity(&self) -> Result<Vec<OptionsActivity>, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_stable() {
        assert_eq!(FetchError::Timeout.reason(), "timeout");
        assert_eq!(
            FetchError::Status {
                status: 503,
                message: "unavailable".into()
            }
            .reason(),
            "status"
        );
    }

    #[tokio::test]
    async fn mock_returns_rows() {
        let mut port = MockMarketDataPort::new();
        port.expect_fetch_snapshots()
            .returning(|_| Ok(vec![Err(SnapshotError::EmptySymbol)]));
        let rows = port.fetch_snapshots(&[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
