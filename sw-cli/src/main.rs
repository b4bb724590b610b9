//! SteemWatch CLI - follow the SteemWatch event stream from a terminal.
//!
//! Streams events with desktop notifications and a live connection status
//! line, manages notifier integrations through the settings API, and edits
//! the local configuration.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use sw_core::config::{AppConfig, ConfigHandle};
use sw_core::error::SwResult;
use sw_core::logging;

/// SteemWatch - Steem blockchain activity, as it happens.
#[derive(Parser)]
#[command(
    name = "steemwatch",
    version,
    about = "SteemWatch event stream client",
    long_about = "Connects to a SteemWatch server, keeps the event stream alive across \n\
                  network failures and shows what arrives."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json).
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output for scripting.
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the event stream and print events as they arrive.
    Stream {
        /// Do not show desktop notifications.
        #[arg(long)]
        no_notify: bool,
        /// Highlight events concerning this account (repeatable).
        #[arg(short, long = "watch", value_name = "ACCOUNT")]
        watch: Vec<String>,
    },
    /// Manage notifier integrations (Discord, Slack, Telegram, steemit.chat).
    Notifiers {
        #[command(subcommand)]
        action: commands::notifiers::NotifiersAction,
    },
    /// View and modify the local configuration.
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> SwResult<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_config_path()?,
    };
    let mut config = if config_path.exists() {
        AppConfig::load_from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    config.apply_env_overrides();

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let log_dir = config.effective_log_dir()?;
    let _guard = logging::init_logging(&log_level, &log_dir, config.logging.json_output)?;

    info!("SteemWatch CLI v{}", sw_core::constants::APP_VERSION);

    let config_handle = ConfigHandle::new(config);

    match cli.command {
        Commands::Stream { no_notify, watch } => {
            commands::stream::run(config_handle, !no_notify, watch, cli.format).await
        }
        Commands::Notifiers { action } => {
            commands::notifiers::run(config_handle, action, cli.format).await
        }
        Commands::Config { action } => {
            commands::config::run(config_handle, config_path, action, cli.format).await
        }
    }
}
