//! Error types for the isapi-stream crate.

use std::time::Duration;

/// Errors raised by the alert stream client.
///
/// Connect and stream errors never escape the connector's task: they drive
/// the reconnect state machine and reach the consumer as
/// [`Signal::Error`](crate::Signal::Error). Frame parse errors are handled
/// inside the connector and never surface at all.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The stream could not be opened
    #[error("Failed to connect to {url}: {reason}")]
    Connect {
        /// Endpoint that was requested
        url: String,
        /// Transport error or rejected status
        reason: String,
    },

    /// The open stream failed while reading
    #[error("Stream read failed: {0}")]
    Stream(String),

    /// No bytes arrived within the idle timeout
    #[error("No data received for {0:?}")]
    IdleTimeout(Duration),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An error occurred during shutdown
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl StreamError {
    /// The stream was never established.
    pub fn is_connect_error(&self) -> bool {
        matches!(self, StreamError::Connect { .. })
    }

    /// The stream was established and then failed or stalled.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, StreamError::Stream(_) | StreamError::IdleTimeout(_))
    }
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_display() {
        let error = StreamError::Connect {
            url: "http://10.0.0.2:80/ISAPI/Event/notification/alertStream".to_string(),
            reason: "HTTP 401 Unauthorized".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Failed to connect to http://10.0.0.2:80/ISAPI/Event/notification/alertStream: HTTP 401 Unauthorized"
        );

        let error = StreamError::Stream("connection reset".to_string());
        assert_eq!(error.to_string(), "Stream read failed: connection reset");

        let error = StreamError::IdleTimeout(Duration::from_secs(90));
        assert_eq!(error.to_string(), "No data received for 90s");

        let error = StreamError::Configuration("host must not be empty".to_string());
        assert_eq!(error.to_string(), "Configuration error: host must not be empty");
    }

    #[test]
    fn test_error_classification() {
        let connect = StreamError::Connect {
            url: "http://cam".to_string(),
            reason: "refused".to_string(),
        };
        assert!(connect.is_connect_error());
        assert!(!connect.is_stream_error());

        assert!(StreamError::Stream("eof".to_string()).is_stream_error());
        assert!(StreamError::IdleTimeout(Duration::from_secs(1)).is_stream_error());
        assert!(!StreamError::Configuration("x".to_string()).is_stream_error());
    }
}
