//! Error types for the event publication subsystem

use thiserror::Error;

/// Failure to append a record to one stream of the backing log
///
/// Returned by every [`crate::StreamLog`]. The publisher absorbs it when
/// the dead-letter append succeeds and otherwise reports it as the
/// `primary` side of [`Error::Publish`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to append to stream '{stream}': {message}")]
pub struct AppendError {
    /// Stream the append targeted
    pub stream: String,

    /// Underlying failure text from the log store
    pub message: String,
}

impl AppendError {
    pub fn new(stream: impl Into<String>, message: impl ToString) -> Self {
        Self {
            stream: stream.into(),
            message: message.to_string(),
        }
    }
}

/// Event publication error types
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backing log unreachable at construction time
    #[error("Connection error: {0}")]
    Connection(String),

    /// Envelope could not be turned into its wire form
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Primary and dead-letter appends both failed; the event was lost
    ///
    /// Display and `source()` both come from `primary`.
    #[error("Publish error: {primary}")]
    Publish {
        #[source]
        primary: AppendError,
        dead_letter: AppendError,
    },
}

impl Error {
    /// True when the error means an event never reached any stream
    pub fn is_event_loss(&self) -> bool {
        matches!(self, Error::Publish { .. })
    }
}

/// Result type alias for publication operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = Error::Connection("connection refused".to_string());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(!err.is_event_loss());
    }

    #[test]
    fn test_publish_error_reports_primary_failure() {
        let err = Error::Publish {
            primary: AppendError::new("distribucion.bloques", "broker unavailable"),
            dead_letter: AppendError::new("distribucion.bloques.dlq", "disk full"),
        };

        let text = err.to_string();
        assert!(text.contains("broker unavailable"));
        assert!(!text.contains("disk full"));
        assert!(err.is_event_loss());

        let source = err.source().expect("publish error has a source");
        assert!(source.to_string().contains("distribucion.bloques"));
    }
}
