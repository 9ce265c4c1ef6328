//! Configuration for the Drishti daemon
//!
//! Loads configuration from a TOML file. Every field has a default, so an
//! empty file yields a working mock setup:
//!
//! ```toml
//! [device]
//! type = "mock"
//! name = "Mock FabScan"
//!
//! [device.simulation]
//! points_per_frame = 40
//! random_seed = 42
//!
//! [scanner]
//! process_numbers = 4          # worker threads
//! texture_illumination = 50    # LED level during the texture pass
//! drain_poll_interval_ms = 100
//!
//! [storage]
//! scans_folder = "/var/lib/drishti/scans"
//!
//! [settings]                   # initial runtime settings
//! resolution = 16
//! color = true
//!
//! [logging]
//! level = "info"
//! ```

use crate::devices::mock::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Initial runtime settings (clients change them later via UPDATE_SETTINGS)
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Device type ("mock")
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,
    #[serde(default = "default_device_name")]
    pub name: String,
    /// Simulation parameters, used by the mock device
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

fn default_device_type() -> String {
    "mock".to_string()
}
fn default_device_name() -> String {
    "Mock FabScan".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            name: default_device_name(),
            simulation: None,
        }
    }
}

/// Scan orchestration parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScannerConfig {
    /// Number of image processing workers (task queue holds one more)
    #[serde(default = "default_process_numbers")]
    pub process_numbers: usize,
    /// LED level (all channels) while capturing texture frames
    #[serde(default = "default_texture_illumination")]
    pub texture_illumination: u8,
    /// Poll interval while waiting for the task queue to drain
    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,
}

fn default_process_numbers() -> usize {
    4
}
fn default_texture_illumination() -> u8 {
    50
}
fn default_drain_poll_interval_ms() -> u64 {
    100
}

impl ScannerConfig {
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }

    /// Task queue capacity
    pub fn queue_capacity(&self) -> usize {
        self.process_numbers + 1
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            process_numbers: default_process_numbers(),
            texture_illumination: default_texture_illumination(),
            drain_poll_interval_ms: default_drain_poll_interval_ms(),
        }
    }
}

/// Where scan artifacts go
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_scans_folder")]
    pub scans_folder: PathBuf,
}

fn default_scans_folder() -> PathBuf {
    PathBuf::from("/var/lib/drishti/scans")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scans_folder: default_scans_folder(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.scanner.process_numbers == 0 {
            return Err(Error::Config(
                "scanner.process_numbers must be at least 1".to_string(),
            ));
        }
        if self.scanner.drain_poll_interval_ms == 0 {
            return Err(Error::Config(
                "scanner.drain_poll_interval_ms must be positive".to_string(),
            ));
        }
        if let Some(sim) = &self.device.simulation {
            if sim.frame_width == 0 || sim.frame_height == 0 {
                return Err(Error::Config(format!(
                    "device.simulation frame size {}x{} must be non-zero",
                    sim.frame_width, sim.frame_height
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.device.device_type, "mock");
        assert_eq!(config.scanner.process_numbers, 4);
        assert_eq!(config.scanner.queue_capacity(), 5);
        assert_eq!(config.scanner.texture_illumination, 50);
        assert_eq!(
            config.scanner.drain_poll_interval(),
            Duration::from_millis(100)
        );
        assert_eq!(config.logging.level, "info");
        assert!(config.device.simulation.is_none());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
type = "mock"
name = "Bench scanner"

[device.simulation]
points_per_frame = 12
random_seed = 7

[scanner]
process_numbers = 2
drain_poll_interval_ms = 5

[storage]
scans_folder = "/tmp/scans"

[settings]
resolution = 200
color = false

[logging]
level = "debug"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.device.name, "Bench scanner");
        let sim = config.device.simulation.unwrap();
        assert_eq!(sim.points_per_frame, 12);
        assert_eq!(sim.random_seed, 7);
        assert_eq!(config.scanner.queue_capacity(), 3);
        assert_eq!(config.storage.scans_folder, PathBuf::from("/tmp/scans"));
        assert_eq!(config.settings.resolution, 200);
        assert!(!config.settings.color);
        assert_eq!(config.settings.laser_positions, 1);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Config::from_toml("[scanner]\nprocess_numbers = 0\n");
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_sized_frame_rejected() {
        for toml_content in [
            "[device.simulation]\nframe_width = 0\n",
            "[device.simulation]\nframe_height = 0\n",
        ] {
            let err = Config::from_toml(toml_content);
            assert!(matches!(err, Err(Error::Config(_))));
        }
        assert!(Config::from_toml("[device.simulation]\nframe_width = 1\n").is_ok());
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drishti.toml");

        let mut config = Config::default();
        config.scanner.process_numbers = 3;
        config.to_file(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.scanner.process_numbers, 3);
        assert!(std::fs::read_to_string(&path)
            .unwrap()
            .contains("[scanner]"));
    }
}
