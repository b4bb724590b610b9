//! Desktop notifications for stream activity.
//!
//! Bursts of events are coalesced: the first event after a quiet period is
//! announced immediately, everything arriving during the following cooldown
//! is counted and announced once when the cooldown ends. Each notification
//! replaces the previous one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use sw_core::config::NotificationConfig;
use sw_core::constants::{notification, APP_NAME};
use sw_core::error::{SwError, SwResult};
use sw_core::platform::Platform;
use sw_socket::{ConnectionManager, Event};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState};

/// Whether the user allows desktop notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// Not decided yet; asking is allowed.
    Default,
}

/// A notification as handed to the desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub title: String,
    pub body: String,
    pub icon: String,
    /// Notifications sharing a tag replace each other.
    pub tag: String,
}

impl DesktopNotification {
    /// The stream notification announcing `count` events.
    pub fn for_batch(count: u64) -> Self {
        Self {
            title: APP_NAME.to_string(),
            body: format!("{count} new event(s) received"),
            icon: notification::ICON_URL.to_string(),
            tag: notification::TAG.to_string(),
        }
    }
}

/// Desktop notification capability.
#[async_trait]
pub trait DesktopNotifier: Send + Sync + 'static {
    /// Whether this environment can show notifications at all.
    fn is_supported(&self) -> bool;

    fn permission(&self) -> Permission;

    /// Ask for permission. Only called when the permission is `Default`.
    async fn request_permission(&self) -> Permission;

    fn show(&self, notification: &DesktopNotification) -> SwResult<()>;
}

/// Native notifications through `notify-rust`.
///
/// There is no permission prompt on the desktop: notifications are allowed
/// exactly when they are enabled in the configuration.
pub struct NativeNotifier {
    enabled: bool,
    platform: Platform,
    /// Id of the last notification shown, replaced by the next one.
    #[cfg(all(unix, not(target_os = "macos")))]
    replaces_id: Mutex<Option<u32>>,
}

impl NativeNotifier {
    pub fn new(enabled: bool) -> Self {
        let platform = Platform::current();
        debug!(
            "desktop notifications via {} ({})",
            platform.notification_backend(),
            if enabled { "enabled" } else { "disabled" }
        );
        Self {
            enabled,
            platform,
            #[cfg(all(unix, not(target_os = "macos")))]
            replaces_id: Mutex::new(None),
        }
    }

    pub fn from_config(config: &NotificationConfig) -> Self {
        Self::new(config.enabled)
    }
}

#[async_trait]
impl DesktopNotifier for NativeNotifier {
    fn is_supported(&self) -> bool {
        self.platform.supports_desktop_notifications()
    }

    fn permission(&self) -> Permission {
        if self.enabled {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    async fn request_permission(&self) -> Permission {
        self.permission()
    }

    fn show(&self, notification: &DesktopNotification) -> SwResult<()> {
        let mut native = notify_rust::Notification::new();
        native
            .summary(&notification.title)
            .body(&notification.body)
            .icon(&notification.icon)
            .appname(APP_NAME);

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let mut replaces_id = self
                .replaces_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(id) = *replaces_id {
                native.id(id);
            }
            let handle = native
                .show()
                .map_err(|e| SwError::Notification(e.to_string()))?;
            *replaces_id = Some(handle.id());
        }

        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            native
                .show()
                .map(|_| ())
                .map_err(|e| SwError::Notification(e.to_string()))?;
        }

        Ok(())
    }
}

/// Counting state of the coalescing window.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescingWindow {
    pending: u64,
    cooling: bool,
}

impl CoalescingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `count` qualifying events. Returns the number to announce
    /// now; the caller must then start a cooldown.
    pub fn record(&mut self, count: u64) -> Option<u64> {
        if count == 0 {
            return None;
        }
        self.pending += count;
        if self.cooling {
            return None;
        }
        self.cooling = true;
        Some(std::mem::take(&mut self.pending))
    }

    /// The cooldown ended. Returns the number to announce, in which case
    /// the cooldown restarts; otherwise cooling stops.
    pub fn window_elapsed(&mut self) -> Option<u64> {
        if self.pending > 0 {
            Some(std::mem::take(&mut self.pending))
        } else {
            self.cooling = false;
            None
        }
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn is_cooling(&self) -> bool {
        self.cooling
    }
}

/// Turns stream activity into rate-limited desktop notifications.
pub struct NotificationThrottler {
    manager: ConnectionManager,
    notifier: Arc<dyn DesktopNotifier>,
    bus: EventBus,
    cooldown: Duration,
    state: Arc<Mutex<ServiceState>>,
    /// Set once the missing notification surface has been reported.
    unsupported_reported: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl NotificationThrottler {
    pub fn new(manager: ConnectionManager, notifier: Arc<dyn DesktopNotifier>, bus: EventBus) -> Self {
        Self {
            manager,
            notifier,
            bus,
            cooldown: Duration::from_millis(notification::COOLDOWN_MS),
            state: Arc::new(Mutex::new(ServiceState::Created)),
            unsupported_reported: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Whether the throttler is currently turning events into notifications.
    pub fn is_active(&self) -> bool {
        self.is_healthy()
            && self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Service for NotificationThrottler {
    fn name(&self) -> &str {
        "notification"
    }

    fn state(&self) -> ServiceState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init(&mut self) -> SwResult<()> {
        if self.task.is_some() {
            return Ok(());
        }
        set_state(&self.state, ServiceState::Running);
        let rx = self.manager.subscribe_messages();
        self.task = Some(tokio::spawn(run_throttler(
            rx,
            Arc::clone(&self.notifier),
            self.bus.clone(),
            self.cooldown,
            Arc::clone(&self.state),
            Arc::clone(&self.unsupported_reported),
        )));
        Ok(())
    }

    fn shutdown(&mut self) -> SwResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        set_state(&self.state, ServiceState::Stopped);
        Ok(())
    }
}

impl Drop for NotificationThrottler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn set_state(slot: &Mutex<ServiceState>, state: ServiceState) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = state;
}

/// Check the notification preconditions. Returns false if the throttler
/// should stay inactive. A missing notification surface is reported through
/// `reported` at most once.
async fn notifications_allowed(
    notifier: &dyn DesktopNotifier,
    bus: &EventBus,
    reported: &AtomicBool,
) -> bool {
    if !notifier.is_supported() {
        let err = SwError::NotificationUnsupported;
        if reported.swap(true, Ordering::SeqCst) {
            debug!("{err}; stream notifications stay disabled");
        } else {
            warn!("{err}; stream notifications disabled");
            bus.emit(AppEvent::NotificationsUnavailable {
                reason: err.to_string(),
            });
        }
        return false;
    }

    let permission = match notifier.permission() {
        Permission::Default => {
            debug!("requesting notification permission");
            notifier.request_permission().await
        }
        decided => decided,
    };

    match permission {
        Permission::Granted => true,
        Permission::Denied | Permission::Default => {
            debug!("{}; stream notifications disabled", SwError::PermissionDenied);
            false
        }
    }
}

async fn run_throttler(
    mut rx: broadcast::Receiver<String>,
    notifier: Arc<dyn DesktopNotifier>,
    bus: EventBus,
    cooldown: Duration,
    state: Arc<Mutex<ServiceState>>,
    unsupported_reported: Arc<AtomicBool>,
) {
    if !notifications_allowed(notifier.as_ref(), &bus, &unsupported_reported).await {
        set_state(&state, ServiceState::Inactive);
        return;
    }
    // Activity from before permission was settled does not count.
    rx = rx.resubscribe();
    info!("stream notifications active (cooldown {}s)", cooldown.as_secs());

    let mut window = CoalescingWindow::new();
    let timer = tokio::time::sleep(cooldown);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let count = match frame {
                    Ok(text) => u64::from(Event::decode(&text).is_ok()),
                    Err(RecvError::Lagged(n)) => {
                        warn!("notification throttler lagged, counting {n} missed frame(s)");
                        n
                    }
                    Err(RecvError::Closed) => break,
                };
                if let Some(count) = window.record(count) {
                    announce(notifier.as_ref(), &bus, count);
                    timer.as_mut().reset(Instant::now() + cooldown);
                }
            }
            () = &mut timer, if window.is_cooling() => {
                match window.window_elapsed() {
                    Some(count) => {
                        announce(notifier.as_ref(), &bus, count);
                        timer.as_mut().reset(Instant::now() + cooldown);
                    }
                    None => debug!("notification cooldown ended"),
                }
            }
        }
    }
}

fn announce(notifier: &dyn DesktopNotifier, bus: &EventBus, count: u64) {
    match notifier.show(&DesktopNotification::for_batch(count)) {
        Ok(()) => {
            info!("notified about {count} new event(s)");
            bus.emit(AppEvent::NotificationShown { count });
        }
        Err(err) => {
            warn!("failed to show notification: {err}");
            bus.emit(AppEvent::NotificationFailed {
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_notification() {
        let n = DesktopNotification::for_batch(4);
        assert_eq!(n.title, "SteemWatch");
        assert_eq!(n.body, "4 new event(s) received");
        assert_eq!(n.tag, "steemwatch-eventstream");
        assert!(n.icon.ends_with("steemwatch-icon.png"));
    }

    #[test]
    fn test_window_burst() {
        let mut window = CoalescingWindow::new();
        assert_eq!(window.record(1), Some(1));
        assert!(window.is_cooling());
        for _ in 0..4 {
            assert_eq!(window.record(1), None);
        }
        assert_eq!(window.pending(), 4);
        assert_eq!(window.window_elapsed(), Some(4));
        assert!(window.is_cooling());
        assert_eq!(window.window_elapsed(), None);
        assert!(!window.is_cooling());
    }

    #[test]
    fn test_window_zero_count_is_ignored() {
        let mut window = CoalescingWindow::new();
        assert_eq!(window.record(0), None);
        assert!(!window.is_cooling());
    }

    #[test]
    fn test_window_restarts_after_quiet_period() {
        let mut window = CoalescingWindow::new();
        assert_eq!(window.record(1), Some(1));
        assert_eq!(window.window_elapsed(), None);
        assert_eq!(window.record(3), Some(3));
    }

    #[test]
    fn test_native_permission_follows_config() {
        assert_eq!(NativeNotifier::new(true).permission(), Permission::Granted);
        let disabled = NativeNotifier::from_config(&NotificationConfig {
            enabled: false,
            ..NotificationConfig::default()
        });
        assert_eq!(disabled.permission(), Permission::Denied);
    }

    #[tokio::test]
    async fn test_native_request_does_not_prompt() {
        let notifier = NativeNotifier::new(false);
        assert_eq!(notifier.request_permission().await, Permission::Denied);
    }
}
