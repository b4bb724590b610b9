//! SteemWatch API - HTTP client for the notifier settings service.
//!
//! The settings service stores per-user configuration of the chat
//! integrations (Discord, Slack, Telegram, steemit.chat). This crate only
//! talks to it; none of its server-side behavior lives here.

pub mod client;
pub mod endpoints;
pub mod models;

// Re-export key types
pub use client::{ApiClient, RetryConfig};
pub use endpoints::notifiers::NotifierSettings;
pub use models::{NotifierDocument, NotifierKind};
