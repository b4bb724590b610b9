//! Application configuration management.
//!
//! Handles loading, saving, and accessing application configuration including
//! the canonical server URL, event stream tuning, and notification settings.
//! Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{SwError, SwResult};
use crate::platform::Platform;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Event stream connection settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Desktop notification settings.
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Canonical URL of the SteemWatch server (e.g., "https://steemwatch.com").
    #[serde(default = "default_canonical_url")]
    pub canonical_url: String,

    /// CSRF token sent with every settings API request.
    #[serde(default)]
    pub csrf_token: String,

    /// Raw session cookie (`name=value`) used to authenticate requests.
    #[serde(default)]
    pub session_cookie: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,
}

/// Event stream configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Path suffix appended to the canonical URL.
    #[serde(default = "default_stream_path")]
    pub path: String,

    /// WebSocket subprotocols requested during the handshake.
    #[serde(default)]
    pub protocols: Vec<String>,

    /// Time allowed for a connect attempt to reach the open state.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// First reconnect delay after an unplanned disconnect.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_ms: u64,

    /// Multiplier applied to the reconnect delay after each failure.
    #[serde(default = "default_reconnect_decay")]
    pub reconnect_decay: f64,

    /// Upper bound of the reconnect delay.
    #[serde(default = "default_max_reconnect_interval")]
    pub max_reconnect_interval_ms: u64,

    /// Maximum number of events kept in the feed.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,

    /// Accounts whose events are flagged as related in the feed.
    #[serde(default)]
    pub watched_accounts: Vec<String>,
}

/// Desktop notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Whether desktop notifications may be shown at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Coalescing window in milliseconds.
    #[serde(default = "default_cooldown")]
    pub cooldown_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_canonical_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_stream_path() -> String {
    constants::EVENT_STREAM_PATH.to_string()
}

fn default_connect_timeout() -> u64 {
    constants::stream::CONNECT_TIMEOUT_MS
}

fn default_reconnect_interval() -> u64 {
    constants::stream::RECONNECT_INTERVAL_MS
}

fn default_reconnect_decay() -> f64 {
    constants::stream::RECONNECT_DECAY
}

fn default_max_reconnect_interval() -> u64 {
    constants::stream::MAX_RECONNECT_INTERVAL_MS
}

fn default_feed_capacity() -> usize {
    constants::DEFAULT_FEED_CAPACITY
}

fn default_cooldown() -> u64 {
    constants::notification::COOLDOWN_MS
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            canonical_url: default_canonical_url(),
            csrf_token: String::new(),
            session_cookie: String::new(),
            api_timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            path: default_stream_path(),
            protocols: Vec::new(),
            connect_timeout_ms: default_connect_timeout(),
            reconnect_interval_ms: default_reconnect_interval(),
            reconnect_decay: default_reconnect_decay(),
            max_reconnect_interval_ms: default_max_reconnect_interval(),
            feed_capacity: default_feed_capacity(),
            watched_accounts: Vec::new(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_ms: default_cooldown(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> SwResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> SwResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can run with.
    pub fn validate(&self) -> SwResult<()> {
        if self.stream.feed_capacity == 0 {
            return Err(SwError::Config(
                "stream.feed_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> SwResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> SwResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SwError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> SwResult<PathBuf> {
        let config_dir = Platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> SwResult<PathBuf> {
        if self.logging.directory.is_empty() {
            let data_dir = Platform::data_dir()?;
            Ok(data_dir.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(constants::CANONICAL_URL_ENV) {
            let url = Self::sanitize_canonical_url(&url);
            if !url.is_empty() {
                self.server.canonical_url = url;
            }
        }
    }

    /// The event stream endpoint derived from the canonical URL.
    pub fn stream_endpoint(&self) -> SwResult<String> {
        derive_stream_url(&self.server.canonical_url, &self.stream.path)
    }

    /// Sanitize and normalize a canonical URL.
    ///
    /// Strips surrounding quotes and whitespace, adds `http://` when no
    /// scheme is given, and removes trailing slashes.
    pub fn sanitize_canonical_url(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Derive the WebSocket endpoint from an HTTP base URL.
///
/// `http` becomes `ws` and `https` becomes `wss`; the path suffix is appended
/// after trailing slashes are removed from the base.
pub fn derive_stream_url(base_url: &str, path: &str) -> SwResult<String> {
    let base = AppConfig::sanitize_canonical_url(base_url);
    if base.is_empty() {
        return Err(SwError::MissingConfig("server.canonical_url".into()));
    }

    let rest = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(SwError::Config(format!(
            "unsupported scheme in canonical url: {base}"
        )));
    };

    let suffix = if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    Ok(format!("{rest}{suffix}"))
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    /// Create a new configuration handle.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Clone out the current configuration.
    pub async fn snapshot(&self) -> AppConfig {
        self.inner.read().await.clone()
    }
}
