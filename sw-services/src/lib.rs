//! SteemWatch Services - consumers of the event stream.
//!
//! This crate provides the components that subscribe to a
//! `ConnectionManager` independently of one another:
//! - Event feed (bounded, newest first, related-account flagging)
//! - Notification throttler (coalesced, rate-limited desktop notifications)
//! - Connection status presenter (status label and reconnect countdown)
//! - Event bus (typed fan-out of what the components observed)
//! - Service lifecycle trait shared by the long-running components

pub mod service;
pub mod event_bus;
pub mod feed;
pub mod notification;
pub mod status;

// Re-export key types
pub use service::{Service, ServiceState};
pub use event_bus::{AppEvent, EventBus};
pub use feed::{EventFeed, FeedEntry, FeedSubscription, SharedFeed};
pub use notification::{
    CoalescingWindow, DesktopNotification, DesktopNotifier, NativeNotifier, NotificationThrottler,
    Permission,
};
pub use status::{ConnectionStatusPresenter, StatusLabel, StatusView};
