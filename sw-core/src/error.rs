//! Global error types for the SteemWatch client.
//!
//! All error categories across the workspace are unified into a single
//! `SwError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using SwError.
pub type SwResult<T> = Result<T, SwError>;

/// Unified error type covering all error categories in SteemWatch.
#[derive(Error, Debug)]
pub enum SwError {
    // -- Configuration errors --
    /// Failed to load or parse application configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Transport errors --
    /// The connection attempt did not reach the open state in time.
    #[error("connection timed out after {0} ms")]
    ConnectionTimeout(u64),

    /// Socket-level error reported by the transport.
    #[error("transport error: {0}")]
    Transport(String),

    /// A frame was sent while the connection was not open.
    #[error("not connected")]
    NotConnected,

    // -- Event stream errors --
    /// An inbound frame could not be decoded as an event.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    // -- Notification errors --
    /// The host has no desktop notification capability.
    #[error("desktop notifications are not supported")]
    NotificationUnsupported,

    /// Notification permission was refused.
    #[error("notification permission denied")]
    PermissionDenied,

    /// Showing a desktop notification failed.
    #[error("notification error: {0}")]
    Notification(String),

    // -- HTTP errors --
    /// HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// HTTP request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Server returned an error response.
    #[error("server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message from server.
        message: String,
    },

    /// Authentication or CSRF validation failed.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SwError {
    /// Whether this error belongs to the transport layer.
    ///
    /// Transport errors are surfaced on the connection's error channel and
    /// never alter the connection state machine on their own.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ConnectionTimeout(_))
    }
}

impl From<serde_json::Error> for SwError {
    fn from(e: serde_json::Error) -> Self {
        SwError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SwError {
    fn from(e: toml::de::Error) -> Self {
        SwError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sw_error_display() {
        let err = SwError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "configuration error: bad value");
        assert_eq!(SwError::NotConnected.to_string(), "not connected");
        assert_eq!(
            SwError::ConnectionTimeout(5000).to_string(),
            "connection timed out after 5000 ms"
        );
    }

    #[test]
    fn test_transport_classification() {
        assert!(SwError::Transport("reset".into()).is_transport());
        assert!(SwError::ConnectionTimeout(1).is_transport());
        assert!(!SwError::NotConnected.is_transport());
        assert!(!SwError::MalformedMessage("x".into()).is_transport());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: SwError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, SwError::Serialization(_)));
    }
}
