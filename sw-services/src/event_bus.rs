//! Typed event bus for what the stream consumers observe.
//!
//! Uses a tokio broadcast channel so the feed and the throttler can report
//! without knowing who is listening. The CLI renders from it; tests assert
//! on it.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use sw_socket::Event;

/// Application-level events.
///
/// These are distinct from raw stream frames: they are what the feed and
/// the throttler made of them.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A decoded event was added to the feed.
    EventReceived {
        event: Event,
        related: bool,
    },
    /// An inbound frame could not be decoded and was dropped.
    MalformedMessage {
        error: String,
    },
    /// A desktop notification was shown for `count` events.
    NotificationShown {
        count: u64,
    },
    /// Showing a desktop notification failed.
    NotificationFailed {
        error: String,
    },
    /// Desktop notifications cannot be shown; the throttler stopped.
    NotificationsUnavailable {
        reason: String,
    },
}

/// Fan-out of [`AppEvent`]s. A subscriber that falls more than the
/// channel capacity behind gets `Lagged` and misses events.
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AppEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    /// Send to every current subscriber. Having none is not an error.
    pub fn emit(&self, event: AppEvent) {
        let label = event_label(&event);
        match self.sender.send(event) {
            Ok(count) => {
                debug!("{label} -> {count} subscriber(s)");
            }
            Err(_) => {
                debug!("{label} dropped, nobody is listening");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(sw_core::constants::stream::CHANNEL_CAPACITY)
    }
}

fn event_label(event: &AppEvent) -> &'static str {
    match event {
        AppEvent::EventReceived { .. } => "EventReceived",
        AppEvent::MalformedMessage { .. } => "MalformedMessage",
        AppEvent::NotificationShown { .. } => "NotificationShown",
        AppEvent::NotificationFailed { .. } => "NotificationFailed",
        AppEvent::NotificationsUnavailable { .. } => "NotificationsUnavailable",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(AppEvent::MalformedMessage {
            error: "invalid envelope".into(),
        });

        match rx.recv().await.unwrap() {
            AppEvent::MalformedMessage { error } => assert_eq!(error, "invalid envelope"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(AppEvent::NotificationShown { count: 4 });

        match (rx1.recv().await.unwrap(), rx2.recv().await.unwrap()) {
            (AppEvent::NotificationShown { count: c1 }, AppEvent::NotificationShown { count: c2 }) => {
                assert_eq!(c1, 4);
                assert_eq!(c2, 4);
            }
            _ => panic!("unexpected event types"),
        }
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers() {
        let bus = EventBus::default();
        bus.emit(AppEvent::NotificationShown { count: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_event_labels() {
        assert_eq!(
            event_label(&AppEvent::NotificationsUnavailable {
                reason: String::new()
            }),
            "NotificationsUnavailable"
        );
    }
}
