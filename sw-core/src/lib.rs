//! SteemWatch Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other SteemWatch crates:
//! - Application configuration (canonical URL, stream tuning, notifications)
//! - Global error type covering transport, feed, notification and HTTP failures
//! - Structured logging with tracing
//! - Platform detection utilities
//! - Common constants

pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::AppConfig;
pub use error::{SwError, SwResult};
pub use logging::init_logging;
pub use platform::Platform;
