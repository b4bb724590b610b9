//! SteemWatch Socket - resilient client for the server-pushed event stream.
//!
//! This crate provides the connection manager that handles:
//! - The connect / open / closing / closed lifecycle of one logical connection
//! - Connect timeouts and automatic reconnection with capped exponential backoff
//! - Generation-tagged timers so stale callbacks never touch a newer connection
//! - State, message and error fan-out via tokio broadcast channels
//! - Decoding of stream frames into typed events

pub mod backoff;
pub mod events;
pub mod manager;
pub mod state;
pub mod timer;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export key types
pub use backoff::BackoffPolicy;
pub use events::{
    AccountUpdated, AccountWitnessVoted, CommentPublished, CommentVoted, Event,
    StoryPublished, StoryVoted, TransferMade, UserFollowChanged, UserMentioned,
};
pub use manager::{ConnectionConfig, ConnectionManager, SocketError};
pub use state::{ConnectionState, ReadyState};
pub use timer::{ScheduledTask, TimerKind};
pub use transport::{ConnectRequest, Socket, SocketReader, SocketWriter, Transport, TungsteniteTransport};
