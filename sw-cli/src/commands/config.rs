//! Configuration commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use console::style;

use sw_core::config::{AppConfig, ConfigHandle};
use sw_core::error::{SwError, SwResult};

use super::print_json;
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Print the configuration file path.
    Path,
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Get a value by key path.
    Get {
        /// Key path (e.g., "server.canonical_url", "stream.connect_timeout_ms").
        key: String,
    },
    /// Set a value by key path and save the file.
    Set {
        /// Key path (e.g., "server.canonical_url", "stream.connect_timeout_ms").
        key: String,
        /// New value.
        value: String,
    },
}

const SECRET: &str = "********";

/// Resolve a dot-separated key path to a value from the config.
fn get_value(cfg: &AppConfig, key: &str) -> Option<String> {
    let value = match key {
        "server.canonical_url" => cfg.server.canonical_url.clone(),
        "server.csrf_token" => masked(&cfg.server.csrf_token),
        "server.session_cookie" => masked(&cfg.server.session_cookie),
        "server.api_timeout_ms" => cfg.server.api_timeout_ms.to_string(),
        "stream.path" => cfg.stream.path.clone(),
        "stream.protocols" => cfg.stream.protocols.join(","),
        "stream.connect_timeout_ms" => cfg.stream.connect_timeout_ms.to_string(),
        "stream.reconnect_interval_ms" => cfg.stream.reconnect_interval_ms.to_string(),
        "stream.reconnect_decay" => cfg.stream.reconnect_decay.to_string(),
        "stream.max_reconnect_interval_ms" => cfg.stream.max_reconnect_interval_ms.to_string(),
        "stream.feed_capacity" => cfg.stream.feed_capacity.to_string(),
        "stream.watched_accounts" => cfg.stream.watched_accounts.join(","),
        "notifications.enabled" => cfg.notifications.enabled.to_string(),
        "notifications.cooldown_ms" => cfg.notifications.cooldown_ms.to_string(),
        "logging.level" => cfg.logging.level.clone(),
        "logging.directory" => cfg.logging.directory.clone(),
        "logging.json_output" => cfg.logging.json_output.to_string(),
        _ => return None,
    };
    Some(value)
}

fn masked(secret: &str) -> String {
    if secret.is_empty() {
        String::new()
    } else {
        SECRET.to_string()
    }
}

fn parse<T: std::str::FromStr>(value: &str, expected: &str) -> Result<T, String> {
    value.trim().parse().map_err(|_| format!("expected {expected}"))
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply a value to a dot-separated key path on the config.
fn set_value(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "server.canonical_url" => {
            cfg.server.canonical_url = AppConfig::sanitize_canonical_url(value);
        }
        "server.csrf_token" => cfg.server.csrf_token = value.to_string(),
        "server.session_cookie" => cfg.server.session_cookie = value.to_string(),
        "server.api_timeout_ms" => cfg.server.api_timeout_ms = parse(value, "an integer")?,
        "stream.path" => cfg.stream.path = value.to_string(),
        "stream.protocols" => cfg.stream.protocols = list(value),
        "stream.connect_timeout_ms" => {
            cfg.stream.connect_timeout_ms = parse(value, "an integer")?;
        }
        "stream.reconnect_interval_ms" => {
            cfg.stream.reconnect_interval_ms = parse(value, "an integer")?;
        }
        "stream.reconnect_decay" => {
            let decay: f64 = parse(value, "a number")?;
            if !decay.is_finite() || decay < 1.0 {
                return Err("expected a number >= 1".to_string());
            }
            cfg.stream.reconnect_decay = decay;
        }
        "stream.max_reconnect_interval_ms" => {
            cfg.stream.max_reconnect_interval_ms = parse(value, "an integer")?;
        }
        "stream.feed_capacity" => {
            let capacity: usize = parse(value, "an integer")?;
            if capacity == 0 {
                return Err("expected an integer >= 1".to_string());
            }
            cfg.stream.feed_capacity = capacity;
        }
        "stream.watched_accounts" => cfg.stream.watched_accounts = list(value),
        "notifications.enabled" => cfg.notifications.enabled = parse(value, "true/false")?,
        "notifications.cooldown_ms" => {
            cfg.notifications.cooldown_ms = parse(value, "an integer")?;
        }
        "logging.level" => {
            let v = value.to_lowercase();
            if !["trace", "debug", "info", "warn", "error"].contains(&v.as_str()) {
                return Err("expected one of: trace, debug, info, warn, error".to_string());
            }
            cfg.logging.level = v;
        }
        "logging.directory" => cfg.logging.directory = value.to_string(),
        "logging.json_output" => cfg.logging.json_output = parse(value, "true/false")?,
        _ => return Err(format!("unknown key: {key}")),
    }
    Ok(())
}

fn print_config_text(cfg: &AppConfig) {
    let sections: [(&str, &[&str]); 4] = [
        (
            "Server",
            &[
                "server.canonical_url",
                "server.csrf_token",
                "server.session_cookie",
                "server.api_timeout_ms",
            ],
        ),
        (
            "Stream",
            &[
                "stream.path",
                "stream.protocols",
                "stream.connect_timeout_ms",
                "stream.reconnect_interval_ms",
                "stream.reconnect_decay",
                "stream.max_reconnect_interval_ms",
                "stream.feed_capacity",
                "stream.watched_accounts",
            ],
        ),
        (
            "Notifications",
            &["notifications.enabled", "notifications.cooldown_ms"],
        ),
        (
            "Logging",
            &["logging.level", "logging.directory", "logging.json_output"],
        ),
    ];

    for (i, (title, keys)) in sections.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", style(title).bold().underlined());
        for key in keys.iter() {
            let value = get_value(cfg, key).unwrap_or_default();
            println!("  {key:<34}{value}");
        }
    }

    if let Ok(endpoint) = cfg.stream_endpoint() {
        println!();
        println!("  {:<34}{}", style("stream endpoint").dim(), endpoint);
    }
}

fn config_json(cfg: &AppConfig) -> SwResult<serde_json::Value> {
    let mut value = serde_json::to_value(cfg)?;
    for key in ["csrf_token", "session_cookie"] {
        if let Some(field) = value.pointer_mut(&format!("/server/{key}")) {
            if field.as_str().is_some_and(|s| !s.is_empty()) {
                *field = serde_json::Value::String(SECRET.to_string());
            }
        }
    }
    Ok(value)
}

fn save(cfg: &AppConfig, path: &Path) -> SwResult<()> {
    cfg.save_to_file(path)
}

pub async fn run(
    config: ConfigHandle,
    path: PathBuf,
    action: ConfigAction,
    format: OutputFormat,
) -> SwResult<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config.read().await;
            match format {
                OutputFormat::Json => print_json(&config_json(&cfg)?),
                OutputFormat::Text => print_config_text(&cfg),
            }
        }
        ConfigAction::Path => match format {
            OutputFormat::Json => print_json(&serde_json::json!({
                "path": path.display().to_string(),
                "exists": path.exists(),
            })),
            OutputFormat::Text => println!("{}", path.display()),
        },
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                println!(
                    "{} {} already exists (use --force to overwrite)",
                    style("SKIP").yellow().bold(),
                    path.display()
                );
                return Ok(());
            }
            save(&AppConfig::default(), &path)?;
            println!(
                "{} Default configuration written to {}",
                style("OK").green().bold(),
                path.display()
            );
        }
        ConfigAction::Get { key } => {
            let cfg = config.read().await;
            let value = get_value(&cfg, &key)
                .ok_or_else(|| SwError::Config(format!("unknown key: {key}")))?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "key": key, "value": value }));
                }
                OutputFormat::Text => println!("{key} = {value}"),
            }
        }
        ConfigAction::Set { key, value } => {
            {
                let mut cfg = config.write().await;
                set_value(&mut cfg, &key, &value)
                    .map_err(|e| SwError::Config(format!("failed to set {key}: {e}")))?;
            }
            let cfg = config.read().await;
            save(&cfg, &path)?;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::json!({ "key": key, "value": value, "saved": true }));
                }
                OutputFormat::Text => {
                    println!("{} {} = {}", style("SET").green().bold(), key, value);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_masks_secrets() {
        let mut cfg = AppConfig::default();
        assert_eq!(get_value(&cfg, "server.csrf_token").unwrap(), "");
        cfg.server.csrf_token = "abc".into();
        assert_eq!(get_value(&cfg, "server.csrf_token").unwrap(), SECRET);
        assert!(get_value(&cfg, "server.nope").is_none());
    }

    #[test]
    fn test_set_values() {
        let mut cfg = AppConfig::default();
        set_value(&mut cfg, "server.canonical_url", "steemwatch.com/").unwrap();
        assert_eq!(cfg.server.canonical_url, "http://steemwatch.com");

        set_value(&mut cfg, "stream.watched_accounts", "alice, bob,").unwrap();
        assert_eq!(cfg.stream.watched_accounts, vec!["alice", "bob"]);

        set_value(&mut cfg, "notifications.enabled", "false").unwrap();
        assert!(!cfg.notifications.enabled);

        assert!(set_value(&mut cfg, "stream.reconnect_decay", "0.5").is_err());
        assert!(set_value(&mut cfg, "stream.connect_timeout_ms", "soon").is_err());
        assert!(set_value(&mut cfg, "logging.level", "loud").is_err());
        assert!(set_value(&mut cfg, "display.theme", "dark").is_err());
    }

    #[test]
    fn test_feed_capacity_must_be_positive() {
        let mut cfg = AppConfig::default();
        assert!(set_value(&mut cfg, "stream.feed_capacity", "0").is_err());
        assert_eq!(cfg.stream.feed_capacity, 10_000);

        set_value(&mut cfg, "stream.feed_capacity", "50").unwrap();
        assert_eq!(cfg.stream.feed_capacity, 50);
    }

    #[test]
    fn test_json_masks_secrets() {
        let mut cfg = AppConfig::default();
        cfg.server.session_cookie = "session=abc".into();
        let value = config_json(&cfg).unwrap();
        assert_eq!(value["server"]["session_cookie"], SECRET);
        assert_eq!(value["server"]["csrf_token"], "");
    }
}
