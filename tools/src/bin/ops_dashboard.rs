//! ops-dashboard: JSON session API over the operations workbook.
//!
//! Usage:
//!   ops-dashboard
//!
//! Configuration comes from config.env / the environment (see MonitorConfig).

use anyhow::{Context, Result};
use opsmon_core::config::MonitorConfig;
use opsmon_tools::server::{router, spawn_session_sweeper, AppState};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = MonitorConfig::load()?;
    log::info!("data file: {}", config.data_file.display());

    let state = AppState::from_config(&config);
    let _sweeper = spawn_session_sweeper(state.clone());

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("cannot bind {}", config.bind))?;
    log::info!(
        "dashboard listening on {} (idle sessions expire after {}s)",
        config.bind,
        config.session_ttl_secs
    );

    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}
