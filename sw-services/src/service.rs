//! Lifecycle shared by the stream consumers.
//!
//! `init` subscribes to the connection manager and spawns the consumer's
//! task, so it must run inside a tokio runtime. `shutdown` aborts the task;
//! whatever the consumer produced so far stays readable.

use sw_core::error::SwResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Constructed, nothing subscribed yet.
    Created,
    Running,
    /// Stopped by `shutdown`.
    Stopped,
    /// Gave up on its own, e.g. notifications are unavailable.
    Inactive,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Inactive => "inactive",
        })
    }
}

/// A component that follows the connection manager in the background.
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> ServiceState;

    /// Start following the manager. A no-op when already running.
    fn init(&mut self) -> SwResult<()>;

    fn shutdown(&mut self) -> SwResult<()>;

    fn is_healthy(&self) -> bool {
        self.state() == ServiceState::Running
    }
}
