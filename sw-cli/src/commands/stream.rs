//! Stream command - follow the event stream until interrupted.

use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tracing::{info, warn};

use sw_core::config::ConfigHandle;
use sw_core::constants::stream;
use sw_core::error::SwResult;
use sw_services::{
    AppEvent, ConnectionStatusPresenter, EventBus, EventFeed, FeedSubscription, NativeNotifier,
    NotificationThrottler, Service, StatusLabel, StatusView,
};
use sw_socket::{ConnectionManager, TungsteniteTransport};

use crate::OutputFormat;

fn status_bar(format: OutputFormat) -> ProgressBar {
    if format == OutputFormat::Json {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn status_message(view: &StatusView) -> String {
    let label = match view.label {
        StatusLabel::Connected => style(view.label.as_str()).green().bold(),
        StatusLabel::Connecting | StatusLabel::Closing => style(view.label.as_str()).yellow(),
        StatusLabel::Disconnected => style(view.label.as_str()).red(),
    };
    match view.countdown {
        Some(seconds) => format!(
            "{label} {} {}",
            style(format!("(reconnecting in {seconds}s)")).dim(),
            style("press Enter to reconnect now").dim().italic()
        ),
        None => label.to_string(),
    }
}

fn render(pb: &ProgressBar, event: &AppEvent, format: OutputFormat) {
    if format == OutputFormat::Json {
        let line = match event {
            AppEvent::EventReceived { event, related } => serde_json::json!({
                "type": "event",
                "related": related,
                "event": event,
            }),
            AppEvent::MalformedMessage { error } => {
                serde_json::json!({ "type": "malformed", "error": error })
            }
            AppEvent::NotificationShown { count } => {
                serde_json::json!({ "type": "notification", "count": count })
            }
            AppEvent::NotificationFailed { error } => {
                serde_json::json!({ "type": "notification_failed", "error": error })
            }
            AppEvent::NotificationsUnavailable { reason } => {
                serde_json::json!({ "type": "notifications_unavailable", "reason": reason })
            }
        };
        println!("{line}");
        return;
    }

    let line = match event {
        AppEvent::EventReceived { event, related } => {
            let time = chrono::Local::now().format("%H:%M:%S");
            let tag = style(format!("[{}]", event.kind())).cyan();
            if *related {
                format!("  {} {tag} {}", style(time).dim(), style(event.summary()).bold())
            } else {
                format!("  {} {tag} {}", style(time).dim(), event.summary())
            }
        }
        AppEvent::MalformedMessage { error } => {
            format!("  {} dropped frame: {error}", style("WARN").yellow())
        }
        AppEvent::NotificationShown { count } => {
            format!("  {}", style(format!("notified about {count} event(s)")).dim())
        }
        AppEvent::NotificationFailed { error } => {
            format!("  {} notification failed: {error}", style("WARN").yellow())
        }
        AppEvent::NotificationsUnavailable { reason } => {
            format!("  {} {reason}", style("WARN").yellow())
        }
    };
    pb.println(line);
}

/// Run the stream command.
pub async fn run(
    config: ConfigHandle,
    notify: bool,
    watch: Vec<String>,
    format: OutputFormat,
) -> SwResult<()> {
    let cfg = config.snapshot().await;
    let manager = ConnectionManager::from_app_config(&cfg, Arc::new(TungsteniteTransport))?;
    let bus = EventBus::default();
    let mut events = bus.subscribe();
    let mut errors = manager.subscribe_errors();

    let mut watched = cfg.stream.watched_accounts.clone();
    watched.extend(watch);
    let feed = Arc::new(RwLock::new(
        EventFeed::new(cfg.stream.feed_capacity)?.with_watched_accounts(watched),
    ));

    let mut subscription = FeedSubscription::new(Arc::clone(&feed), manager.clone(), bus.clone());
    subscription.init()?;

    let mut throttler = if notify && cfg.notifications.enabled {
        let notifier = Arc::new(NativeNotifier::from_config(&cfg.notifications));
        let mut throttler = NotificationThrottler::new(manager.clone(), notifier, bus.clone())
            .with_cooldown(Duration::from_millis(cfg.notifications.cooldown_ms));
        throttler.init()?;
        Some(throttler)
    } else {
        info!("desktop notifications off");
        None
    };

    let mut presenter = ConnectionStatusPresenter::new(manager.clone());
    presenter.init()?;
    let mut view = presenter.subscribe();

    if format == OutputFormat::Text {
        println!(
            "{} Streaming from {} (Ctrl+C to stop)",
            style("SteemWatch").bold(),
            manager.endpoint()
        );
    }
    let pb = status_bar(format);
    pb.set_message(status_message(&view.borrow_and_update()));

    manager.connect();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => render(&pb, &event, format),
                Err(RecvError::Lagged(n)) => {
                    warn!("output fell behind, {n} event(s) not shown");
                }
                Err(RecvError::Closed) => break,
            },
            error = errors.recv() => match error {
                Ok(error) => warn!("{error}"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *view.borrow_and_update();
                pb.set_message(status_message(&current));
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    if presenter.view().countdown.is_some() {
                        info!("reconnecting on request");
                        presenter.reconnect();
                    }
                }
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                pb.set_message("closing".to_string());
                manager
                    .close_and_wait(Duration::from_millis(stream::CLOSE_GRACE_MS))
                    .await;
                break;
            }
        }
    }

    presenter.shutdown()?;
    if let Some(throttler) = throttler.as_mut() {
        throttler.shutdown()?;
    }
    subscription.shutdown()?;
    pb.finish_and_clear();

    let feed = feed.read().await;
    let related = feed.related().count();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "type": "summary", "events": feed.len(), "related": related })
        ),
        OutputFormat::Text => println!(
            "{} {} event(s) received, {} related",
            style("Done.").bold(),
            feed.len(),
            related
        ),
    }

    Ok(())
}
