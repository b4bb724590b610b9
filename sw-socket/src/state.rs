//! Connection lifecycle state.

use std::time::Duration;

/// Ready state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadyState::Connecting => write!(f, "CONNECTING"),
            ReadyState::Open => write!(f, "OPEN"),
            ReadyState::Closing => write!(f, "CLOSING"),
            ReadyState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// State notification published on every transition.
///
/// `reconnect_interval` is only set when the connection entered `Closed`
/// without being asked to, and holds the delay before the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub ready_state: ReadyState,
    pub reconnect_interval: Option<Duration>,
}

impl ConnectionState {
    pub fn new(ready_state: ReadyState) -> Self {
        Self {
            ready_state,
            reconnect_interval: None,
        }
    }

    pub fn closed() -> Self {
        Self::new(ReadyState::Closed)
    }

    pub fn reconnecting_in(delay: Duration) -> Self {
        Self {
            ready_state: ReadyState::Closed,
            reconnect_interval: Some(delay),
        }
    }

    pub fn is_open(&self) -> bool {
        self.ready_state == ReadyState::Open
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reconnect_interval {
            Some(delay) => write!(f, "{} (reconnect in {}ms)", self.ready_state, delay.as_millis()),
            None => write!(f, "{}", self.ready_state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ReadyState::Connecting.to_string(), "CONNECTING");
        assert_eq!(ConnectionState::closed().to_string(), "CLOSED");
        assert_eq!(
            ConnectionState::reconnecting_in(Duration::from_secs(2)).to_string(),
            "CLOSED (reconnect in 2000ms)"
        );
    }

    #[test]
    fn test_is_open() {
        assert!(ConnectionState::new(ReadyState::Open).is_open());
        assert!(!ConnectionState::closed().is_open());
    }
}
