//! Notifier integration commands.

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use sw_api::{ApiClient, NotifierDocument, NotifierKind};
use sw_core::config::ConfigHandle;
use sw_core::error::{SwError, SwResult};

use super::{print_json, truncate};
use crate::OutputFormat;

#[derive(Subcommand)]
pub enum NotifiersAction {
    /// Show the state of every notifier.
    List,
    /// Show the stored settings of one notifier.
    Show {
        /// discord, slack, telegram or steemit-chat.
        kind: NotifierKind,
    },
    /// Turn notifications through a notifier on.
    Enable { kind: NotifierKind },
    /// Turn notifications through a notifier off.
    Disable { kind: NotifierKind },
    /// Unlink a notifier from the account.
    Disconnect {
        kind: NotifierKind,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

fn document_json(kind: NotifierKind, doc: &NotifierDocument) -> serde_json::Value {
    serde_json::json!({
        "kind": kind.as_str(),
        "enabled": doc.enabled,
        "connected": doc.is_connected(),
        "settings": doc.settings,
    })
}

fn enabled_label(doc: &NotifierDocument) -> String {
    if !doc.is_connected() {
        style("not connected").dim().to_string()
    } else if doc.enabled {
        style("enabled").green().to_string()
    } else {
        style("disabled").yellow().to_string()
    }
}

async fn list(api: &ApiClient, format: OutputFormat) -> SwResult<()> {
    let mut rows = Vec::with_capacity(NotifierKind::ALL.len());
    for kind in NotifierKind::ALL {
        let result = api.notifier(kind).load().await;
        rows.push((kind, result));
    }

    match format {
        OutputFormat::Json => {
            let items: Vec<_> = rows
                .iter()
                .map(|(kind, result)| match result {
                    Ok(doc) => document_json(*kind, doc),
                    Err(e) => serde_json::json!({ "kind": kind.as_str(), "error": e.to_string() }),
                })
                .collect();
            print_json(&serde_json::Value::Array(items));
        }
        OutputFormat::Text => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Notifier", "State", "Settings"]);

            for (kind, result) in &rows {
                match result {
                    Ok(doc) => table.add_row(vec![
                        kind.to_string(),
                        enabled_label(doc),
                        truncate(&doc.settings.to_string(), 60),
                    ]),
                    Err(e) => table.add_row(vec![
                        kind.to_string(),
                        style("error").red().to_string(),
                        truncate(&e.to_string(), 60),
                    ]),
                };
            }
            println!("{table}");
        }
    }
    Ok(())
}

async fn show(api: &ApiClient, kind: NotifierKind, format: OutputFormat) -> SwResult<()> {
    let doc = api.notifier(kind).load().await?;
    match format {
        OutputFormat::Json => print_json(&document_json(kind, &doc)),
        OutputFormat::Text => {
            println!("{}", style(format!("Notifier {kind}")).bold().underlined());
            println!("  State:    {}", enabled_label(&doc));
            match doc.settings.as_object() {
                Some(map) if !map.is_empty() => {
                    println!("  Settings:");
                    for (name, value) in map {
                        let shown = value
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| value.to_string());
                        println!("    {name:<16}{shown}");
                    }
                }
                _ => println!("  Settings: {}", style("none").dim()),
            }
        }
    }
    Ok(())
}

async fn set_enabled(
    api: &ApiClient,
    kind: NotifierKind,
    enabled: bool,
    format: OutputFormat,
) -> SwResult<()> {
    api.notifier(kind).set_enabled(enabled).await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "kind": kind.as_str(),
            "enabled": enabled,
        })),
        OutputFormat::Text => {
            let what = if enabled { "enabled" } else { "disabled" };
            println!("{} {kind} {what}", style("OK").green().bold());
        }
    }
    Ok(())
}

async fn disconnect(
    api: &ApiClient,
    kind: NotifierKind,
    yes: bool,
    format: OutputFormat,
) -> SwResult<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Disconnect {kind} from your SteemWatch account?"))
            .default(false)
            .interact()
            .map_err(|e| SwError::Internal(e.to_string()))?;
        if !confirmed {
            println!("{} Nothing changed.", style("SKIP").yellow().bold());
            return Ok(());
        }
    }

    api.notifier(kind).disconnect().await?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "kind": kind.as_str(),
            "disconnected": true,
        })),
        OutputFormat::Text => println!("{} {kind} disconnected", style("OK").green().bold()),
    }
    Ok(())
}

pub async fn run(config: ConfigHandle, action: NotifiersAction, format: OutputFormat) -> SwResult<()> {
    let api = super::create_api_client(&config).await?;

    match action {
        NotifiersAction::List => list(&api, format).await,
        NotifiersAction::Show { kind } => show(&api, kind, format).await,
        NotifiersAction::Enable { kind } => set_enabled(&api, kind, true, format).await,
        NotifiersAction::Disable { kind } => set_enabled(&api, kind, false, format).await,
        NotifiersAction::Disconnect { kind, yes } => disconnect(&api, kind, yes, format).await,
    }
}
