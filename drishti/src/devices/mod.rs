//! Device implementations

pub mod mock;

use crate::config::Config;
use crate::core::driver::HardwareController;
use crate::core::services::{Calibration, ImageProcessor};
use crate::error::{Error, Result};
use mock::MockScanner;
use std::sync::Arc;

/// Device-specific collaborators of the orchestrator
pub struct DeviceSet {
    pub hardware: Box<dyn HardwareController>,
    pub processor: Arc<dyn ImageProcessor>,
    pub calibration: Box<dyn Calibration>,
}

impl From<MockScanner> for DeviceSet {
    fn from(scanner: MockScanner) -> Self {
        Self {
            hardware: Box::new(scanner.hardware),
            processor: Arc::new(scanner.processor),
            calibration: Box::new(scanner.calibration),
        }
    }
}

/// Create the scanner devices based on configuration
pub fn create_device(config: &Config) -> Result<DeviceSet> {
    match config.device.device_type.as_str() {
        "mock" => {
            let simulation = config.device.simulation.clone().unwrap_or_default();
            Ok(MockScanner::new(simulation).into())
        }
        _ => Err(Error::UnknownDevice(config.device.device_type.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_mock_device() {
        let config = Config::default();
        let devices = create_device(&config).unwrap();
        assert!(devices.hardware.board_connected());
        assert!(devices.calibration.is_calibrated());
    }

    #[test]
    fn test_unknown_device_type() {
        let mut config = Config::default();
        config.device.device_type = "ciclop".to_string();
        assert!(matches!(
            create_device(&config),
            Err(Error::UnknownDevice(t)) if t == "ciclop"
        ));
    }
}
