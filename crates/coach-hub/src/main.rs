mod api;
mod config;
mod logging;
mod persist;
mod quotes;
mod record_store;
mod ws;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use chrono::Local;
use coach_core::{FocusController, InMemoryDailyCounter, NotificationHub};
use tracing::{error, info, warn};

use crate::{
    api::AppState,
    config::{Config, RecordStoreConfig},
    persist::RecordStoreHook,
    quotes::QuoteStore,
    record_store::RecordStore,
};

#[tokio::main]
async fn main() {
    let config = config::load_config();
    let _log_guard = logging::init_logging(&config);
    let addr: SocketAddr = match config.addr.parse() {
        Ok(value) => value,
        Err(err) => {
            error!(event = "invalid_addr", error = %err, addr = %config.addr);
            return;
        }
    };

    let state = match build_state(&config).await {
        Ok(value) => Arc::new(value),
        Err(err) => {
            error!(event = "startup_error", error = %format!("{err:#}"));
            return;
        }
    };
    let app = api::router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(value) => value,
        Err(err) => {
            error!(event = "hub_error", error = %err);
            return;
        }
    };

    info!(event = "hub_start", addr = %config.addr);

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(event = "hub_error", error = %err);
    }
    info!(event = "hub_stop");
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let store = match &config.record_store {
        Some(store_config) => Some(Arc::new(connect_store(store_config).await?)),
        None => {
            warn!(event = "record_store_disabled", reason = "missing PB_URL, PB_EMAIL or PB_PASSWORD");
            None
        }
    };

    let today = match &store {
        Some(store) => store
            .today_focus_count(Local::now().date_naive())
            .await
            .context("loading today's focus count")?,
        None => 0,
    };
    let controller = FocusController::new(
        Arc::new(InMemoryDailyCounter::seeded(today)),
        NotificationHub::new(),
    );
    if let Some(store) = &store {
        controller
            .register_hook(Arc::new(RecordStoreHook::new(store.clone())))
            .await;
    }

    let quotes = QuoteStore::load(&config.quotes_path)
        .with_context(|| format!("reading quotes from {}", config.quotes_path.display()))?;

    Ok(AppState {
        controller,
        quotes,
        store,
        default_duration: config.default_duration,
        write_timeout: config.write_timeout,
        queue_capacity: config.queue_capacity,
    })
}

async fn connect_store(config: &RecordStoreConfig) -> anyhow::Result<RecordStore> {
    RecordStore::connect(&config.url, config.email.clone(), config.password.clone())
        .await
        .with_context(|| format!("connecting to record store at {}", config.url))
}
