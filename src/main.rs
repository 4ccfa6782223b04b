use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use slotbook::config::AppConfig;
use slotbook::db::Database;
use slotbook::services::notify::webhook::WebhookNotifier;
use slotbook::services::notify::{LogNotifier, Notifier};
use slotbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let db = Database::open(&config.database_url, config.db_busy_timeout)?;

    let notifier: Arc<dyn Notifier> = if config.notify_webhook_url.is_empty() {
        tracing::info!("no NOTIFY_WEBHOOK_URL set, customer notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        tracing::info!("sending customer notifications to {}", config.notify_webhook_url);
        Arc::new(WebhookNotifier::new(config.notify_webhook_url.clone()))
    };

    let state = Arc::new(AppState {
        db,
        config: config.clone(),
        notifier,
    });

    let app = slotbook::app(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
