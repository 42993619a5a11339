//! Alert Dispatch Port (Driven Port)
//!
//! Interface for delivering rendered alert text to a chat destination.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Dispatch error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DispatchError {
    /// Destination could not be reached.
    #[error("dispatch connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Destination rejected the message.
    #[error("dispatch rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error details.
        message: String,
    },

    /// The call did not finish in time.
    #[error("dispatch timed out")]
    Timeout,
}

impl DispatchError {
    /// Label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Rejected { .. } => "rejected",
            Self::Timeout => "timeout",
        }
    }
}

/// Port for sending alert messages.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertDispatchPort: Send + Sync {
    /// Deliver one message.
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError>;
}

/// Dispatcher that keeps every message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl AlertDispatchPort for RecordingDispatcher {
    async fn dispatch(&self, text: &str) -> Result<(), DispatchError> {
        self.sent.lock().push(text.to_string());
        Ok(())
    }
}
