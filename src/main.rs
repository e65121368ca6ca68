use anyhow::Context;

use dist_forge::config::load_settings;
use dist_forge::log_collector::ensure_logs_dir_exists;
use dist_forge::{LogCollector, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (settings, settings_source) = load_settings().context("Failed to load build settings")?;

    // =========================================================================
    // LOGGING INITIALIZATION - MUST PRECEDE ANY BUILD OUTPUT
    // =========================================================================
    let log_dir = settings.log_path();
    ensure_logs_dir_exists(&log_dir).map_err(anyhow::Error::msg)?;
    let max_level = settings.level_filter();
    let log_collector = LogCollector::new(log_dir, None, true)
        .map_err(anyhow::Error::msg)
        .context("LogCollector initialization failed")?
        .with_max_level(max_level);

    if let Err(e) = log::set_boxed_logger(Box::new(log_collector.clone()))
        .map(|()| log::set_max_level(max_level))
    {
        eprintln!("[Main] WARNING: Failed to set LogCollector as global logger: {}", e);
    }
    match settings_source {
        Some(ref path) => log::debug!("Loaded settings from {}", path.display()),
        None => log::debug!("No settings file found, using defaults"),
    }
    log::debug!(
        "Session log: {}",
        log_collector.session_log_path().display()
    );

    let strict = settings.fail_on_job_error;
    let mut orchestrator = Orchestrator::new(settings, log_collector.clone());
    let result = orchestrator.run().await;

    // Everything logged during the run must reach console and disk before exit
    if let Err(e) = log_collector.wait_for_empty().await {
        eprintln!("[Main] WARNING: Failed to flush log collector: {}", e);
    }

    let report = result.context("Release pipeline aborted")?;
    if strict {
        report.into_strict_result()?;
    }
    Ok(())
}
