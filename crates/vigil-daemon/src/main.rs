use std::sync::Arc;

use tracing::info;

use vigil_notify::{LogSender, NotificationSender, WebhookSender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info,vigil_monitor=info".into()),
        )
        .init();

    // load config: explicit path > VIGIL_CONFIG env > ~/.vigil/vigil.toml
    let config_path = std::env::var("VIGIL_CONFIG").ok();
    let config = vigil_core::config::VigilConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        vigil_core::config::VigilConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let sender = build_sender(&config);
    info!(sender = sender.name(), "delivery adapter selected");

    let engine = vigil_monitor::MonitorEngine::new(db, sender, config.monitor.clone())?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let monitor = tokio::spawn(engine.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // the engine finishes any in-flight scan before observing the flag
    let _ = shutdown_tx.send(true);
    monitor.await?;
    Ok(())
}

/// Pick the delivery adapter from config: webhook when a URL is set,
/// otherwise the log-only fallback.
fn build_sender(config: &vigil_core::config::VigilConfig) -> Arc<dyn NotificationSender> {
    match config.notify.webhook_url {
        Some(ref url) => Arc::new(WebhookSender::new(
            url.clone(),
            config.notify.webhook_token.clone(),
            config.notify.timeout_ms,
        )),
        None => Arc::new(LogSender::new()),
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }
}
