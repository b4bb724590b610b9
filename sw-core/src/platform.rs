//! Host platform: where files live and whether notifications can be shown.

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{SwError, SwResult};

/// Operating system family the binary was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

/// Environment variable that points at the D-Bus session bus on Linux.
const DBUS_SESSION_ENV: &str = "DBUS_SESSION_BUS_ADDRESS";

fn app_dir(base: Option<PathBuf>, what: &str) -> SwResult<PathBuf> {
    base.map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| SwError::Config(format!("could not determine {what} directory")))
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Log files and other state, e.g. `~/.local/share/SteemWatch` on Linux.
    pub fn data_dir() -> SwResult<PathBuf> {
        app_dir(dirs::data_dir(), "data")
    }

    /// Home of `config.toml`, e.g. `~/.config/SteemWatch` on Linux.
    pub fn config_dir() -> SwResult<PathBuf> {
        app_dir(dirs::config_dir(), "config")
    }

    /// Whether a desktop notification surface is reachable.
    ///
    /// Linux needs a D-Bus session bus; headless sessions have none.
    pub fn supports_desktop_notifications(&self) -> bool {
        match self {
            Platform::Windows | Platform::MacOs => true,
            Platform::Linux => std::env::var_os(DBUS_SESSION_ENV).is_some(),
        }
    }

    /// What shows the notifications, for log lines.
    pub fn notification_backend(&self) -> &'static str {
        match self {
            Platform::Windows => "toast notifications",
            Platform::MacOs => "notification center",
            Platform::Linux => "freedesktop notifications over D-Bus",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Windows => "Windows",
            Platform::MacOs => "macOS",
            Platform::Linux => "Linux",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
