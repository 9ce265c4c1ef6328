//! Calibration lifecycle stub for the mock scanner

use crate::core::services::Calibration;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Observable calibration state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalibrationState {
    pub calibrated: bool,
    pub running: bool,
    /// Completed start/stop cycles
    pub runs: u32,
}

/// Mock calibration: no algorithm, just the start/stop lifecycle
pub struct MockCalibration {
    state: Arc<Mutex<MockCalibrationState>>,
}

impl MockCalibration {
    pub fn new(calibrated: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockCalibrationState {
                calibrated,
                ..Default::default()
            })),
        }
    }

    /// Shared handle to the simulated state
    pub fn state(&self) -> Arc<Mutex<MockCalibrationState>> {
        Arc::clone(&self.state)
    }
}

impl Calibration for MockCalibration {
    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            return Err(Error::Other("calibration already running".to_string()));
        }
        state.running = true;
        log::info!("Mock calibration started");
        Ok(())
    }

    /// Stopping a run counts as a successful calibration
    fn stop(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        if state.running {
            state.running = false;
            state.calibrated = true;
            state.runs += 1;
            log::info!("Mock calibration finished");
        }
        Ok(())
    }

    fn is_calibrated(&self) -> bool {
        self.state.lock().calibrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut calibration = MockCalibration::new(false);
        let state = calibration.state();
        assert!(!calibration.is_calibrated());

        calibration.start().unwrap();
        assert!(state.lock().running);
        assert!(calibration.start().is_err());

        calibration.stop().unwrap();
        assert!(calibration.is_calibrated());
        assert_eq!(state.lock().runs, 1);

        // Stop without a run is a no-op
        calibration.stop().unwrap();
        assert_eq!(state.lock().runs, 1);
    }
}
