//! subrelay server entry point.
//!
//! Loads configuration, opens the cache store and serves the HTTP routes.
//! Logs are JSON on stderr.

use std::sync::Arc;

use anyhow::{Context, Result};
use subrelay_client::Relay;
use subrelay_core::{AppConfig, CacheDb};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod app;
mod error;
mod query;
mod routes;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        db_path = %config.db_path.display(),
        converter_url = %config.converter_url,
        "starting subrelay"
    );

    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache store at {}", config.db_path.display()))?;
    let relay = Relay::from_config(&config, Arc::new(store)).context("building relay")?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    app::serve_on_listener(listener, app::AppState { relay }).await?;

    tracing::info!("subrelay stopped");
    Ok(())
}
