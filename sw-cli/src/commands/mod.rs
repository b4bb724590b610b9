//! CLI command implementations.

pub mod config;
pub mod notifiers;
pub mod stream;

use sw_api::ApiClient;
use sw_core::config::ConfigHandle;
use sw_core::error::SwResult;

/// Helper to create an API client from config.
pub async fn create_api_client(config: &ConfigHandle) -> SwResult<ApiClient> {
    let server_config = config.read().await.server.clone();
    ApiClient::new(&server_config)
}

/// Print a JSON value, pretty-printed.
pub fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Truncate a string to at most `max_chars` characters, appending an
/// ellipsis if truncated.
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
