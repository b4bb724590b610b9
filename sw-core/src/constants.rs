//! Application-wide constants.

/// Application name, also used as the desktop notification title.
pub const APP_NAME: &str = "SteemWatch";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path suffix of the event stream endpoint, appended to the canonical URL.
pub const EVENT_STREAM_PATH: &str = "/api/eventstream/ws";

/// Path prefix of the notifier settings API.
pub const NOTIFIERS_API_PATH: &str = "/api/notifiers";

/// Header carrying the CSRF token on every settings API request.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Environment variable overriding the configured canonical URL.
pub const CANONICAL_URL_ENV: &str = "STEEMWATCH_CANONICAL_URL";

/// Default server API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Stream connection defaults.
pub mod stream {
    /// Time allowed for a connect attempt to reach the open state.
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;
    /// How long a shutting-down client waits for the closing handshake.
    pub const CLOSE_GRACE_MS: u64 = 2_000;
    /// First reconnect delay after an unplanned disconnect.
    pub const RECONNECT_INTERVAL_MS: u64 = 1_000;
    /// Multiplier applied to the reconnect delay after each failure.
    pub const RECONNECT_DECAY: f64 = 2.0;
    /// Upper bound of the reconnect delay.
    pub const MAX_RECONNECT_INTERVAL_MS: u64 = 5 * 60 * 1_000;
    /// Buffer size of the manager's broadcast channels.
    pub const CHANNEL_CAPACITY: usize = 1_024;
}

/// Event feed defaults.
pub const DEFAULT_FEED_CAPACITY: usize = 10_000;

/// Desktop notification constants.
pub mod notification {
    /// Cooldown window during which events are coalesced.
    pub const COOLDOWN_MS: u64 = 5 * 60 * 1_000;
    /// Tag shared by every stream notification so a new one replaces the last.
    pub const TAG: &str = "steemwatch-eventstream";
    /// Icon shown with every stream notification.
    pub const ICON_URL: &str = "https://steemwatch.com/images/steemwatch-icon.png";
}

/// Notifier integrations exposed by the settings API.
pub mod notifiers {
    pub const DISCORD: &str = "discord";
    pub const SLACK: &str = "slack";
    pub const TELEGRAM: &str = "telegram";
    pub const STEEMIT_CHAT: &str = "steemit-chat";

    /// All notifier kinds.
    pub const ALL: &[&str] = &[DISCORD, SLACK, TELEGRAM, STEEMIT_CHAT];
}
