//! Integration tests for the event feed.
//!
//! Drives a connection manager over the in-memory transport and checks
//! what ends up in the shared feed and on the event bus.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use sw_services::event_bus::AppEvent;
use sw_services::feed::{EventFeed, FeedSubscription, SharedFeed};
use sw_services::service::{Service, ServiceState};
use sw_socket::testing::MockTransport;
use sw_socket::Event;
use tokio::sync::{broadcast, RwLock};

fn shared_feed(capacity: usize, watched: &[&str]) -> SharedFeed {
    let watched = watched.iter().map(|s| s.to_string()).collect();
    Arc::new(RwLock::new(EventFeed::new(capacity).unwrap().with_watched_accounts(watched)))
}

fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---- Ingestion ----

#[tokio::test(start_paused = true)]
async fn malformed_frame_between_valid_frames_is_reported_and_dropped() {
    let transport = MockTransport::new();
    let manager = create_test_manager(&transport);
    let bus = create_test_event_bus();
    let mut bus_rx = bus.subscribe();
    let feed = shared_feed(100, &["bob"]);

    let mut subscription = FeedSubscription::new(feed.clone(), manager.clone(), bus.clone());
    subscription.init().unwrap();
    assert_eq!(subscription.state(), ServiceState::Running);

    let remote = connect_and_open(&manager, &transport).await;
    remote.push_text(transfer_frame("alice", "bob", "1.000 STEEM"));
    remote.push_text("{not json");
    remote.push_text(account_updated_frame("carol"));
    settle().await;

    let feed = feed.read().await;
    assert_eq!(feed.len(), 2);
    let newest = feed.get(0).unwrap();
    assert!(matches!(&newest.event, Event::AccountUpdated(e) if e.account == "carol"));
    assert!(!newest.related);
    let oldest = feed.get(1).unwrap();
    assert!(matches!(&oldest.event, Event::TransferMade(e) if e.to == "bob"));
    assert!(oldest.related);
    assert!(oldest.received_at <= newest.received_at);

    let events = drain(&mut bus_rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], AppEvent::EventReceived { related: true, .. }));
    assert!(matches!(&events[1], AppEvent::MalformedMessage { .. }));
    assert!(matches!(&events[2], AppEvent::EventReceived { related: false, .. }));
}

#[tokio::test(start_paused = true)]
async fn unknown_kinds_are_kept() {
    let transport = MockTransport::new();
    let manager = create_test_manager(&transport);
    let feed = shared_feed(100, &[]);
    let mut subscription = FeedSubscription::new(feed.clone(), manager.clone(), create_test_event_bus());
    subscription.init().unwrap();

    let remote = connect_and_open(&manager, &transport).await;
    remote.push_text(r#"{"kind":"witness.missed_block","payload":{"witness":"bob"}}"#);
    settle().await;

    let feed = feed.read().await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed.latest().unwrap().event.kind(), "witness.missed_block");
}

#[tokio::test(start_paused = true)]
async fn feed_is_bounded() {
    let transport = MockTransport::new();
    let manager = create_test_manager(&transport);
    let feed = shared_feed(3, &[]);
    let mut subscription = FeedSubscription::new(feed.clone(), manager.clone(), create_test_event_bus());
    subscription.init().unwrap();

    let remote = connect_and_open(&manager, &transport).await;
    for i in 0..10 {
        remote.push_text(account_updated_frame(&format!("user{i}")));
    }
    settle().await;

    let feed = feed.read().await;
    assert_eq!(feed.len(), 3);
    let accounts: Vec<_> = feed
        .iter()
        .map(|entry| match &entry.event {
            Event::AccountUpdated(e) => e.account.clone(),
            other => panic!("unexpected event: {other:?}"),
        })
        .collect();
    assert_eq!(accounts, vec!["user9", "user8", "user7"]);
}

// ---- Lifecycle ----

#[tokio::test(start_paused = true)]
async fn feed_keeps_filling_across_reconnects() {
    let transport = MockTransport::new();
    let manager = create_test_manager(&transport);
    let feed = shared_feed(100, &[]);
    let mut subscription = FeedSubscription::new(feed.clone(), manager.clone(), create_test_event_bus());
    subscription.init().unwrap();

    let remote = connect_and_open(&manager, &transport).await;
    remote.push_text(account_updated_frame("first"));
    settle().await;
    remote.hang_up();

    // First reconnect attempt is scheduled one second out.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(transport.open_count(), 2);
    let remote = transport.last_remote().unwrap();
    remote.push_text(account_updated_frame("second"));
    settle().await;

    assert_eq!(feed.read().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_ingestion_but_keeps_entries() {
    let transport = MockTransport::new();
    let manager = create_test_manager(&transport);
    let feed = shared_feed(100, &[]);
    let mut subscription = FeedSubscription::new(feed.clone(), manager.clone(), create_test_event_bus());
    subscription.init().unwrap();

    let remote = connect_and_open(&manager, &transport).await;
    remote.push_text(account_updated_frame("kept"));
    settle().await;

    subscription.shutdown().unwrap();
    assert_eq!(subscription.state(), ServiceState::Stopped);
    remote.push_text(account_updated_frame("ignored"));
    settle().await;

    assert_eq!(feed.read().await.len(), 1);
    assert!(Arc::ptr_eq(&subscription.feed(), &feed));
}
