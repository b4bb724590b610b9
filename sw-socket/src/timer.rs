//! One-shot timers tagged with the connection generation that created them.

use std::time::Duration;

use tokio::task::JoinHandle;

/// What a pending timer is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    ConnectTimeout,
    ReconnectDelay,
}

impl std::fmt::Display for TimerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerKind::ConnectTimeout => write!(f, "connect-timeout"),
            TimerKind::ReconnectDelay => write!(f, "reconnect-delay"),
        }
    }
}

/// A spawned sleep that runs a callback once.
///
/// Dropping the task aborts it, so replacing or clearing the slot that owns
/// it is enough to cancel.
#[derive(Debug)]
pub struct ScheduledTask {
    kind: TimerKind,
    generation: u64,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn spawn<F>(kind: TimerKind, generation: u64, delay: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        Self {
            kind,
            generation,
            handle,
        }
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
