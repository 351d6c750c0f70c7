//! Shopfront - storefront commerce API

use std::sync::Arc;

use anyhow::Result;
use shopfront::notify::{DynNotifier, LogNotifier, NatsNotifier};
use shopfront::services::Services;
use shopfront::store::{DynStore, MemoryStore, PgStore, Store};
use shopfront::{router, AppConfig, AppState};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn open_store(config: &AppConfig) -> Result<DynStore> {
    let Some(url) = config.database_url.as_deref() else {
        warn!("DATABASE_URL not set, using the in-memory store");
        return Ok(Arc::new(MemoryStore::new()));
    };
    let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("database migrations applied");
    Ok(Arc::new(PgStore::new(pool)))
}

async fn open_notifier(config: &AppConfig) -> DynNotifier {
    let Some(url) = config.nats_url.as_deref() else {
        return Arc::new(LogNotifier);
    };
    match async_nats::connect(url).await {
        Ok(client) => {
            info!(url, "connected to NATS");
            Arc::new(NatsNotifier::new(client, config.notify_subject_prefix.clone()))
        }
        Err(e) => {
            warn!(url, error = %e, "NATS unavailable, events will only be logged");
            Arc::new(LogNotifier)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = open_store(&config).await?;
    let notifier = open_notifier(&config).await;
    info!(backend = store.backend_tag(), "store ready");
    let app = router(AppState::new(Services::new(store, notifier, config.commerce())));

    let addr = config.socket_addr();
    info!("🚀 Shopfront listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
