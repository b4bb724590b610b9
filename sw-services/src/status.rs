//! Human-readable connection status with a live reconnect countdown.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use sw_core::error::SwResult;
use sw_socket::{ConnectionManager, ConnectionState, ReadyState};

use crate::service::{Service, ServiceState};

const TICK: Duration = Duration::from_secs(1);

/// Label shown for a connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Connecting,
    Connected,
    Closing,
    Disconnected,
}

impl StatusLabel {
    pub fn from_ready_state(state: ReadyState) -> Self {
        match state {
            ReadyState::Connecting => StatusLabel::Connecting,
            ReadyState::Open => StatusLabel::Connected,
            ReadyState::Closing => StatusLabel::Closing,
            ReadyState::Closed => StatusLabel::Disconnected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Connecting => "connecting",
            StatusLabel::Connected => "connected",
            StatusLabel::Closing => "closing",
            StatusLabel::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the status line shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView {
    pub label: StatusLabel,
    /// Whole seconds until the next reconnect attempt.
    pub countdown: Option<u64>,
}

impl StatusView {
    pub fn from_state(state: &ConnectionState) -> Self {
        Self {
            label: StatusLabel::from_ready_state(state.ready_state),
            countdown: None,
        }
    }
}

impl std::fmt::Display for StatusView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.countdown {
            Some(seconds) => write!(f, "{} (reconnecting in {seconds}s)", self.label),
            None => write!(f, "{}", self.label),
        }
    }
}

/// Whole seconds shown for a reconnect delay, rounded up.
pub fn countdown_seconds(interval: Duration) -> u64 {
    let millis = interval.as_millis();
    u64::try_from(millis.div_ceil(1_000)).unwrap_or(u64::MAX)
}

#[derive(Default)]
struct Countdown {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct PresenterShared {
    view_tx: watch::Sender<StatusView>,
    countdown: Mutex<Countdown>,
}

impl PresenterShared {
    fn cancel_countdown(&self) {
        let mut countdown = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        countdown.generation += 1;
        if let Some(task) = countdown.task.take() {
            task.abort();
        }
        self.view_tx.send_if_modified(|view| view.countdown.take().is_some());
    }

    fn start_countdown(self: &Arc<Self>, seconds: u64) {
        let mut countdown = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        countdown.generation += 1;
        if let Some(task) = countdown.task.take() {
            task.abort();
        }
        if seconds == 0 {
            self.view_tx.send_if_modified(|view| view.countdown.take().is_some());
            return;
        }

        let generation = countdown.generation;
        self.view_tx.send_modify(|view| view.countdown = Some(seconds));
        let shared = Arc::clone(self);
        countdown.task = Some(tokio::spawn(async move {
            for remaining in (0..seconds).rev() {
                tokio::time::sleep(TICK).await;
                if !shared.tick(generation, remaining) {
                    return;
                }
            }
        }));
    }

    /// Returns false once the countdown is superseded.
    fn tick(&self, generation: u64, remaining: u64) -> bool {
        let countdown = self.countdown.lock().unwrap_or_else(PoisonError::into_inner);
        if countdown.generation != generation {
            return false;
        }
        let value = (remaining > 0).then_some(remaining);
        self.view_tx.send_modify(|view| view.countdown = value);
        true
    }

    fn apply(self: &Arc<Self>, state: &ConnectionState) {
        let label = StatusLabel::from_ready_state(state.ready_state);
        self.view_tx.send_if_modified(|view| {
            let changed = view.label != label;
            view.label = label;
            changed
        });
        match (state.ready_state, state.reconnect_interval) {
            (ReadyState::Closed, Some(interval)) => {
                self.start_countdown(countdown_seconds(interval));
            }
            _ => self.cancel_countdown(),
        }
    }
}

/// Derives a [`StatusView`] from the manager's state channel.
pub struct ConnectionStatusPresenter {
    manager: ConnectionManager,
    shared: Arc<PresenterShared>,
    state: ServiceState,
    task: Option<JoinHandle<()>>,
}

impl ConnectionStatusPresenter {
    pub fn new(manager: ConnectionManager) -> Self {
        let (view_tx, _) = watch::channel(StatusView::from_state(&manager.state()));
        Self {
            manager,
            shared: Arc::new(PresenterShared {
                view_tx,
                countdown: Mutex::new(Countdown::default()),
            }),
            state: ServiceState::Created,
            task: None,
        }
    }

    pub fn view(&self) -> StatusView {
        *self.shared.view_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.shared.view_tx.subscribe()
    }

    /// Reconnect right away instead of waiting for the countdown.
    pub fn reconnect(&self) {
        self.shared.cancel_countdown();
        self.manager.connect();
    }
}

impl Service for ConnectionStatusPresenter {
    fn name(&self) -> &str {
        "status"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> SwResult<()> {
        if self.task.is_some() {
            return Ok(());
        }
        let rx = self.manager.subscribe_state();
        self.shared.apply(&self.manager.state());
        self.task = Some(tokio::spawn(follow_state(
            rx,
            self.manager.clone(),
            Arc::clone(&self.shared),
        )));
        self.state = ServiceState::Running;
        Ok(())
    }

    fn shutdown(&mut self) -> SwResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.cancel_countdown();
        self.state = ServiceState::Stopped;
        Ok(())
    }
}

impl Drop for ConnectionStatusPresenter {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.shared.cancel_countdown();
    }
}

async fn follow_state(
    mut rx: broadcast::Receiver<ConnectionState>,
    manager: ConnectionManager,
    shared: Arc<PresenterShared>,
) {
    loop {
        match rx.recv().await {
            Ok(state) => {
                debug!("status: {state}");
                shared.apply(&state);
            }
            Err(RecvError::Lagged(n)) => {
                warn!("status presenter missed {n} state change(s)");
                shared.apply(&manager.state());
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<PresenterShared> {
        let (view_tx, _) = watch::channel(StatusView::from_state(&ConnectionState::closed()));
        Arc::new(PresenterShared {
            view_tx,
            countdown: Mutex::new(Countdown::default()),
        })
    }

    fn countdown(shared: &PresenterShared) -> Option<u64> {
        shared.view_tx.borrow().countdown
    }

    #[test]
    fn test_labels() {
        assert_eq!(StatusLabel::from_ready_state(ReadyState::Open).as_str(), "connected");
        assert_eq!(StatusLabel::from_ready_state(ReadyState::Closed).to_string(), "disconnected");
        let view = StatusView {
            label: StatusLabel::Disconnected,
            countdown: Some(3),
        };
        assert_eq!(view.to_string(), "disconnected (reconnecting in 3s)");
    }

    #[test]
    fn test_countdown_seconds_rounds_up() {
        assert_eq!(countdown_seconds(Duration::from_millis(4_000)), 4);
        assert_eq!(countdown_seconds(Duration::from_millis(1_500)), 2);
        assert_eq!(countdown_seconds(Duration::from_millis(1)), 1);
        assert_eq!(countdown_seconds(Duration::ZERO), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_down_then_clears() {
        let shared = shared();
        shared.apply(&ConnectionState::reconnecting_in(Duration::from_secs(4)));
        assert_eq!(countdown(&shared), Some(4));

        let mut seen = Vec::new();
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(1_000)).await;
            tokio::task::yield_now().await;
            seen.push(countdown(&shared));
        }
        assert_eq!(seen, vec![Some(3), Some(2), Some(1), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connecting_cancels_countdown() {
        let shared = shared();
        shared.apply(&ConnectionState::reconnecting_in(Duration::from_secs(10)));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(countdown(&shared), Some(8));

        shared.apply(&ConnectionState::new(ReadyState::Connecting));
        assert_eq!(countdown(&shared), None);
        assert_eq!(shared.view_tx.borrow().label, StatusLabel::Connecting);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(countdown(&shared), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_countdown_replaces_old() {
        let shared = shared();
        shared.apply(&ConnectionState::reconnecting_in(Duration::from_secs(2)));
        shared.apply(&ConnectionState::reconnecting_in(Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(countdown(&shared), Some(3));
    }
}
