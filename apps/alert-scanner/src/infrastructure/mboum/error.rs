//! Mboum-specific error types.

use thiserror::Error;

use crate::application::ports::FetchError;

/// Errors from the Mboum adapter.
#[derive(Debug, Error, Clone)]
pub enum MboumError {
    /// Request could not be sent or the body could not be read.
    #[error("network error: {0}")]
    Network(String),

    /// API returned a non-success status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or message.
        message: String,
    },

    /// API key rejected.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Response body was not the expected JSON.
    #[error("JSON parsing error: {0}")]
    JsonParse(String),

    /// Retries exhausted.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Retries made before giving up.
        attempts: u32,
    },

    /// Client could not be constructed.
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<MboumError> for FetchError {
    fn from(err: MboumError) -> Self {
        match err {
            MboumError::Network(message) | MboumError::Config(message) => {
                Self::Connection { message }
            }
            MboumError::MaxRetriesExceeded { attempts } => Self::Connection {
                message: format!("max retries exceeded after {attempts} attempts"),
            },
            MboumError::Api { status, message } => Self::Status { status, message },
            MboumError::AuthenticationFailed => Self::Unauthorized,
            MboumError::JsonParse(message) => Self::Decode { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_fetch_error() {
        assert!(matches!(
            FetchError::from(MboumError::AuthenticationFailed),
            FetchError::Unauthorized
        ));
        assert!(matches!(
            FetchError::from(MboumError::Api {
                status: 503,
                message: "down".into()
            }),
            FetchError::Status { status: 503, .. }
        ));
        assert!(matches!(
            FetchError::from(MboumError::MaxRetriesExceeded { attempts: 2 }),
            FetchError::Connection { .. }
        ));
        assert!(matches!(
            FetchError::from(MboumError::JsonParse("eof".into())),
            FetchError::Decode { .. }
        ));
    }
}
