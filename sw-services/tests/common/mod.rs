//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sw_core::error::{SwError, SwResult};
use sw_services::event_bus::EventBus;
use sw_services::notification::{DesktopNotification, DesktopNotifier, Permission};
use sw_socket::testing::{MockRemote, MockTransport};
use sw_socket::{ConnectionConfig, ConnectionManager, ReadyState};

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_event_bus() -> EventBus {
    EventBus::new(64)
}

/// Create a manager over the given mock transport with default tuning.
pub fn create_test_manager(transport: &MockTransport) -> ConnectionManager {
    create_test_manager_with(transport, ConnectionConfig::default())
}

pub fn create_test_manager_with(
    transport: &MockTransport,
    config: ConnectionConfig,
) -> ConnectionManager {
    ConnectionManager::new(
        "ws://localhost:8080/api/eventstream/ws",
        config,
        Arc::new(transport.clone()),
    )
}

/// Connect and wait until the socket is open. Returns the server side.
pub async fn connect_and_open(manager: &ConnectionManager, transport: &MockTransport) -> MockRemote {
    let mut states = manager.subscribe_state();
    manager.connect();
    loop {
        let state = states.recv().await.expect("state channel closed");
        if state.ready_state == ReadyState::Open {
            break;
        }
    }
    transport.last_remote().expect("no socket was accepted")
}

/// Let spawned tasks drain their channels without moving past any timer
/// that matters to the test.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

pub fn account_updated_frame(account: &str) -> String {
    format!(r#"{{"kind":"account.updated","payload":{{"account":"{account}"}}}}"#)
}

pub fn transfer_frame(from: &str, to: &str, amount: &str) -> String {
    format!(
        r#"{{"kind":"transfer.made","payload":{{"from":"{from}","to":"{to}","amount":"{amount}"}}}}"#
    )
}

/// Notifier that records what it was asked to show.
pub struct RecordingNotifier {
    supported: bool,
    permission: Mutex<Permission>,
    answer: Permission,
    fail: bool,
    requests: AtomicUsize,
    shown: Mutex<Vec<DesktopNotification>>,
}

impl RecordingNotifier {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self::build(true, Permission::Granted, Permission::Granted, false))
    }

    pub fn denied() -> Arc<Self> {
        Arc::new(Self::build(true, Permission::Denied, Permission::Denied, false))
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self::build(false, Permission::Granted, Permission::Granted, false))
    }

    /// Permission undecided; a request is answered with `answer`.
    pub fn undecided(answer: Permission) -> Arc<Self> {
        Arc::new(Self::build(true, Permission::Default, answer, false))
    }

    /// Granted, but every `show` fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self::build(true, Permission::Granted, Permission::Granted, true))
    }

    fn build(supported: bool, permission: Permission, answer: Permission, fail: bool) -> Self {
        Self {
            supported,
            permission: Mutex::new(permission),
            answer,
            fail,
            requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn shown(&self) -> Vec<DesktopNotification> {
        self.shown.lock().unwrap().clone()
    }

    /// Bodies of the notifications shown so far.
    pub fn bodies(&self) -> Vec<String> {
        self.shown().into_iter().map(|n| n.body).collect()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DesktopNotifier for RecordingNotifier {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Permission {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.permission.lock().unwrap() = self.answer;
        self.answer
    }

    fn show(&self, notification: &DesktopNotification) -> SwResult<()> {
        if self.fail {
            return Err(SwError::Notification("notification daemon unavailable".into()));
        }
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
