//! StarApp notification daemon.
//!
//! Ticks every `notify.tick_secs`; when the morning or evening hour is reached it walks
//! the known users one by one and pushes their selection or confirmation card to the
//! configured chat webhook.

use chrono::Utc;
use starapp_core::{due_slot, run_round, BotConfig, Notifier, OutcomeTracker, SentLog};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[starapp-daemon] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match BotConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[starapp-daemon] invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    if !config.notify.enabled {
        tracing::info!("notifications disabled (notify.enabled = false); exiting");
        return;
    }
    let notifier = match Notifier::from_config(&config.notify) {
        Ok(n) => n,
        Err(e) => {
            tracing::error!(error = %e, "cannot start notifier");
            std::process::exit(1);
        }
    };
    let store = match config.open_store() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to open outcome store");
            std::process::exit(1);
        }
    };
    let tracker = OutcomeTracker::new(store);
    let style = config.card_style();
    let tick_secs = config.notify.tick_secs.max(1);

    tracing::info!(
        tick_secs,
        morning_hour = config.notify.morning_hour,
        evening_hour = config.notify.evening_hour,
        "StarApp daemon started"
    );

    let mut sent = SentLog::default();
    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = Utc::now();
                if let Some(slot) = due_slot(now, &config.notify, &sent) {
                    match run_round(slot, &tracker, &style, &notifier, now).await {
                        Ok(report) => {
                            tracing::info!(
                                slot = slot.as_str(),
                                users = report.users,
                                delivered = report.delivered,
                                failed = report.failed,
                                "notification round finished"
                            );
                            sent.mark(slot, now.date_naive());
                        }
                        Err(e) => {
                            tracing::warn!(slot = slot.as_str(), error = %e, "notification round failed; retrying next tick");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("CTRL-C received; shutting down daemon");
                break;
            }
        }
    }
}
