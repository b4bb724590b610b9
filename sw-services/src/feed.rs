//! Bounded, newest-first feed of decoded stream events.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sw_core::constants::DEFAULT_FEED_CAPACITY;
use sw_core::error::{SwError, SwResult};
use sw_socket::{ConnectionManager, Event};

use crate::event_bus::{AppEvent, EventBus};
use crate::service::{Service, ServiceState};

/// One received event.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub event: Event,
    pub received_at: DateTime<Utc>,
    /// Whether the event concerns one of the watched accounts.
    pub related: bool,
}

/// Most recent events first, at most `capacity` of them.
#[derive(Debug, Clone)]
pub struct EventFeed {
    entries: VecDeque<FeedEntry>,
    capacity: usize,
    watched: Vec<String>,
}

impl EventFeed {
    /// Fails for a capacity of zero, which could not hold the newest event.
    pub fn new(capacity: usize) -> SwResult<Self> {
        if capacity == 0 {
            return Err(SwError::Config("feed capacity must be at least 1".into()));
        }
        Ok(Self {
            entries: VecDeque::new(),
            capacity,
            watched: Vec::new(),
        })
    }

    pub fn with_watched_accounts(mut self, accounts: Vec<String>) -> Self {
        self.watched = accounts;
        self
    }

    /// Flag future events concerning `account` as related.
    pub fn watch_account(&mut self, account: impl Into<String>) {
        let account = account.into();
        if !self.watched.contains(&account) {
            self.watched.push(account);
        }
    }

    pub fn watched_accounts(&self) -> &[String] {
        &self.watched
    }

    pub fn is_related(&self, event: &Event) -> bool {
        self.watched.iter().any(|account| event.is_related(account))
    }

    /// Decode a raw frame and insert it. A frame that does not decode
    /// leaves the feed untouched.
    pub fn ingest(&mut self, frame: &str) -> SwResult<&FeedEntry> {
        let event = Event::decode(frame)?;
        Ok(self.push(event))
    }

    pub fn push(&mut self, event: Event) -> &FeedEntry {
        self.push_at(event, Utc::now())
    }

    pub fn push_at(&mut self, event: Event, received_at: DateTime<Utc>) -> &FeedEntry {
        let related = self.is_related(&event);
        self.entries.push_front(FeedEntry {
            event,
            received_at,
            related,
        });
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index 0 is the newest entry.
    pub fn get(&self, index: usize) -> Option<&FeedEntry> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&FeedEntry> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    pub fn related(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter().filter(|entry| entry.related)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: DEFAULT_FEED_CAPACITY,
            watched: Vec::new(),
        }
    }
}

/// Feed shared between the draining task and readers.
pub type SharedFeed = Arc<RwLock<EventFeed>>;

/// Drains a manager's message channel into a shared feed.
///
/// Malformed frames are reported on the event bus as
/// [`AppEvent::MalformedMessage`] and dropped. Dropping the subscription
/// stops the task.
pub struct FeedSubscription {
    feed: SharedFeed,
    manager: ConnectionManager,
    bus: EventBus,
    state: ServiceState,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    pub fn new(feed: SharedFeed, manager: ConnectionManager, bus: EventBus) -> Self {
        Self {
            feed,
            manager,
            bus,
            state: ServiceState::Created,
            task: None,
        }
    }

    pub fn feed(&self) -> SharedFeed {
        Arc::clone(&self.feed)
    }

    /// Stop draining. The feed keeps its entries.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("feed subscription cancelled");
        }
    }
}

impl Service for FeedSubscription {
    fn name(&self) -> &str {
        "feed"
    }

    fn state(&self) -> ServiceState {
        self.state
    }

    fn init(&mut self) -> SwResult<()> {
        if self.task.is_some() {
            return Ok(());
        }
        let rx = self.manager.subscribe_messages();
        self.task = Some(tokio::spawn(drain_messages(
            rx,
            Arc::clone(&self.feed),
            self.bus.clone(),
        )));
        self.state = ServiceState::Running;
        info!("feed subscription started");
        Ok(())
    }

    fn shutdown(&mut self) -> SwResult<()> {
        self.cancel();
        self.state = ServiceState::Stopped;
        Ok(())
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn drain_messages(
    mut rx: broadcast::Receiver<String>,
    feed: SharedFeed,
    bus: EventBus,
) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                let mut feed = feed.write().await;
                match feed.ingest(&frame) {
                    Ok(entry) => {
                        debug!("feed: {} (related={})", entry.event.kind(), entry.related);
                        bus.emit(AppEvent::EventReceived {
                            event: entry.event.clone(),
                            related: entry.related,
                        });
                    }
                    Err(err) => {
                        warn!("dropping stream frame: {err}");
                        bus.emit(AppEvent::MalformedMessage {
                            error: err.to_string(),
                        });
                    }
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!("feed lagged behind the stream, {n} frame(s) lost");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_socket::events::{AccountUpdated, TransferMade};

    fn account_updated(account: &str) -> Event {
        Event::AccountUpdated(AccountUpdated {
            account: account.into(),
        })
    }

    #[test]
    fn test_newest_first() {
        let mut feed = EventFeed::new(10).unwrap();
        feed.push(account_updated("a"));
        feed.push(account_updated("b"));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.get(0).unwrap().event, account_updated("b"));
        assert_eq!(feed.latest().unwrap().event, account_updated("b"));
        assert_eq!(feed.get(1).unwrap().event, account_updated("a"));
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut feed = EventFeed::new(3).unwrap();
        for name in ["a", "b", "c", "d", "e"] {
            feed.push(account_updated(name));
        }
        assert_eq!(feed.len(), 3);
        let order: Vec<_> = feed.iter().map(|e| e.event.clone()).collect();
        assert_eq!(
            order,
            vec![account_updated("e"), account_updated("d"), account_updated("c")]
        );
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = EventFeed::new(0).unwrap_err();
        assert!(matches!(err, SwError::Config(_)));

        let mut feed = EventFeed::new(1).unwrap();
        feed.push(account_updated("a"));
        feed.push(account_updated("b"));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.latest().unwrap().event, account_updated("b"));
    }

    #[test]
    fn test_default_capacity() {
        let mut feed = EventFeed::default();
        assert_eq!(feed.capacity(), 10_000);
        for _ in 0..10_001 {
            feed.push(account_updated("a"));
        }
        assert_eq!(feed.len(), 10_000);
    }

    #[test]
    fn test_malformed_frame_leaves_feed_untouched() {
        let mut feed = EventFeed::new(10).unwrap();
        feed.ingest(r#"{"kind":"account.updated","payload":{"account":"a"}}"#)
            .unwrap();
        assert!(feed.ingest("{oops").is_err());
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn test_related_flag() {
        let mut feed = EventFeed::new(10).unwrap().with_watched_accounts(vec!["bob".into()]);
        feed.watch_account("bob");
        assert_eq!(feed.watched_accounts().len(), 1);

        let entry = feed.push(Event::TransferMade(TransferMade {
            from: "alice".into(),
            to: "bob".into(),
            amount: "1.000 STEEM".into(),
            memo: String::new(),
        }));
        assert!(entry.related);
        feed.push(account_updated("bob"));
        assert_eq!(feed.related().count(), 1);

        feed.clear();
        assert!(feed.is_empty());
    }
}
