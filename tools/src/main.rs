//! threshold-checker: one run of the ratio threshold check.
//!
//! Usage:
//!   threshold-checker
//!
//! Configuration comes from config.env / the environment (see MonitorConfig).
//! Intended for an external scheduler. Always exits 0.

use anyhow::Result;
use opsmon_core::{
    checker::{CheckOutcome, Checker},
    config::MonitorConfig,
    notification::{NotificationSink, WebhookSink},
    provider::WorkbookProvider,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    let config = match MonitorConfig::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("configuration error: {e:#}");
            return Ok(());
        }
    };

    let sink = match WebhookSink::from_config(&config) {
        Ok(s) => Some(s),
        Err(e) => {
            log::error!("{e}");
            None
        }
    };

    let provider = WorkbookProvider::new(&config.data_file);
    let checker = Checker::new(
        &provider,
        sink.as_ref().map(|s| s as &dyn NotificationSink),
        config.threshold,
        &config.dashboard_url,
    );

    let report = checker.run();
    let alerts = report.breach_count();
    match &report.outcome {
        CheckOutcome::Clean => log::info!("check finished: all clear"),
        CheckOutcome::Alerted => log::info!("check finished: {alerts} alert(s) sent"),
        CheckOutcome::NotificationDisabled => {
            log::warn!("check finished: {alerts} alert(s) not sent (no webhook)")
        }
        CheckOutcome::NotificationFailed { error } => {
            log::warn!("check finished: {alerts} alert(s), sending failed: {error}")
        }
        CheckOutcome::LoadFailed { error } => log::warn!("check finished: data not loaded: {error}"),
    }

    Ok(())
}
