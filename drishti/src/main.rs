//! Drishti - scan orchestration daemon
//!
//! Loads the TOML configuration, builds the scanner devices and starts the
//! scan orchestrator. Bus events are logged; with `--scan` a single scan is
//! run and the daemon exits once it has finished.

use drishti::config::Config;
use drishti::devices::create_device;
use drishti::error::{Error, Result};
use drishti::events::{BusEvent, EventBus, NoticeLevel};
use drishti::scan::{OrchestratorParts, ScanCommand, ScanOrchestrator};
use drishti::settings::MemorySettingsStore;
use drishti::storage::FsScanStorage;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `drishti <path>` (positional)
/// - `drishti --config <path>` (flag-based)
/// - `drishti -c <path>` (short flag)
///
/// Defaults to `/etc/drishti.toml` if not specified.
fn parse_config_path(args: &[String]) -> String {
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/drishti.toml".to_string()
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = parse_config_path(&args);
    let single_scan = args.iter().any(|a| a == "--scan");

    // Config comes first so its log level can seed the filter
    let config = Config::load(&config_path);
    let level = config
        .as_ref()
        .map_or("info", |c| c.logging.level.as_str())
        .to_string();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::info!("Drishti v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    let config = config?;

    log::info!(
        "Device: {} ({})",
        config.device.name,
        config.device.device_type
    );
    let devices = create_device(&config)?;

    let bus = Arc::new(EventBus::new());
    let events = bus.subscribe();
    let settings = Arc::new(MemorySettingsStore::new(config.settings.clone()));
    let storage = Box::new(FsScanStorage::new(&config.storage.scans_folder));
    log::info!("Scans folder: {}", config.storage.scans_folder.display());

    let parts = OrchestratorParts::new(devices, settings, storage, bus);
    let (scanner, orchestrator) = ScanOrchestrator::spawn(config.scanner.clone(), parts)?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    let shutdown_handle = scanner.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
        shutdown_handle.send(ScanCommand::Shutdown).ok();
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    scanner.send(ScanCommand::NotifyHardwareState)?;
    scanner.send(ScanCommand::NotifyIfNotCalibrated)?;
    match scanner.hardware_info(Duration::from_secs(2)) {
        Ok(Some(version)) => log::info!("Firmware: {}", version),
        Ok(None) => log::warn!("Firmware version unavailable"),
        Err(e) => log::warn!("Hardware info request failed: {}", e),
    }

    if single_scan {
        scanner.start()?;
    }
    log::info!("Drishti running. Press Ctrl-C to stop.");

    // Event logger: runs on the main thread until shutdown
    while running.load(Ordering::Relaxed) && !orchestrator.is_finished() {
        let Ok(event) = events.recv_timeout(Duration::from_millis(100)) else {
            continue;
        };
        match event {
            BusEvent::Notice(notice) => match notice.level {
                NoticeLevel::Error => log::error!("{:?} {}", notice.message, notice.payload),
                NoticeLevel::Warn => log::warn!("{:?} {}", notice.message, notice.payload),
                _ => log::info!("{:?} {}", notice.message, notice.payload),
            },
            BusEvent::Progress(update) => {
                log::debug!(
                    "Scan {}: {}/{} (+{} points)",
                    update.scan_id,
                    update.progress,
                    update.total,
                    update.points.len()
                );
            }
            BusEvent::Completed(done) => {
                log::info!("Scan {} complete: {} points", done.scan_id, done.point_count);
                if single_scan {
                    scanner.send(ScanCommand::Shutdown).ok();
                }
            }
        }
    }

    log::info!("Shutting down...");
    scanner.send(ScanCommand::Shutdown).ok();
    drop(scanner);
    if orchestrator.join().is_err() {
        log::error!("Scan orchestrator panicked");
    }

    log::info!("Drishti stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_config_path() {
        assert_eq!(parse_config_path(&args(&["drishti"])), "/etc/drishti.toml");
        assert_eq!(parse_config_path(&args(&["drishti", "a.toml"])), "a.toml");
        assert_eq!(
            parse_config_path(&args(&["drishti", "--scan", "-c", "b.toml"])),
            "b.toml"
        );
        assert_eq!(
            parse_config_path(&args(&["drishti", "--config", "c.toml"])),
            "c.toml"
        );
    }
}
