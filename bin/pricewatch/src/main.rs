use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, Notifier, NotifyMode};
use engine::{MoralisClient, Scheduler, Tracker, TrackerSettings};
use mailer::{HttpMailer, LogMailer};
use store::PriceStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(notify_mode = %cfg.notify_mode, tick = ?cfg.tick_interval, "PriceWatch starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let store = PriceStore::connect(&cfg.database_url, cfg.store_timeout)
        .await
        .context("failed to open price store")?;

    // ── Ports ─────────────────────────────────────────────────────────────────
    let feed = MoralisClient::new(&cfg.moralis_api_key, &cfg.moralis_base_url, cfg.feed_timeout)
        .context("failed to build price feed client")?;

    let notifier: Arc<dyn Notifier> = match cfg.notify_mode {
        NotifyMode::Live => {
            info!(url = %cfg.mail_api_url, "Live notifications via HTTP mailer");
            let key = cfg.mail_api_key.clone().unwrap_or_default();
            Arc::new(
                HttpMailer::new(&cfg.mail_api_url, key, &cfg.mail_from, cfg.notify_timeout)
                    .context("failed to build mailer")?,
            )
        }
        NotifyMode::DryRun => {
            info!("Dry-run mode, notifications are only logged");
            Arc::new(LogMailer::new())
        }
    };

    // ── Engine ────────────────────────────────────────────────────────────────
    let tracker = Arc::new(Tracker::new(
        Arc::new(feed),
        notifier,
        store,
        TrackerSettings::from_config(&cfg),
    ));
    let scheduler = Scheduler::new(tracker.clone(), cfg.tick_interval);

    // ── API ───────────────────────────────────────────────────────────────────
    let api_state = api::AppState {
        tracker,
        notify_mode: cfg.notify_mode,
        api_token: cfg.api_token.clone(),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(scheduler.run());
    let port = cfg.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "API server stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
