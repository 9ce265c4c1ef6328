//! Mock scanner for hardware-free operation
//!
//! Simulates the controller board, turntable, lasers, LED ring, camera, the
//! vision pipeline and the calibration lifecycle, so the daemon and the test
//! suite run without a FabScan attached.
//!
//! | Component | Simulation |
//! |-----------|------------|
//! | Turntable | Step counter, requires motors enabled |
//! | Camera | Solid frames: hue gradient (texture), red column per laser (laser) |
//! | Vision pipeline | Points on a cylinder at the turntable angle, gaussian jitter |
//! | Calibration | start/stop lifecycle only |
//! | Failures | Configurable acquisition/processing failure rates |
//!
//! Example configuration:
//!
//! ```toml
//! [device]
//! type = "mock"
//! name = "Mock FabScan"
//!
//! [device.simulation]
//! points_per_frame = 24
//! object_radius = 60.0
//! noise_stddev = 0.2
//! acquisition_delay_ms = 20
//! processing_delay_ms = 5
//! random_seed = 42      # 0 = random each run
//! ```

pub mod calibration;
pub mod config;
pub mod hardware;
pub mod noise;
pub mod processor;

pub use calibration::{MockCalibration, MockCalibrationState};
pub use config::SimulationConfig;
pub use hardware::{HardwareCall, MockHardware, MockHardwareState};
pub use processor::MockImageProcessor;

use parking_lot::Mutex;
use std::sync::Arc;

/// Complete mock scanner plus handles to its observable state
pub struct MockScanner {
    pub hardware: MockHardware,
    pub processor: MockImageProcessor,
    pub calibration: MockCalibration,
}

impl MockScanner {
    pub fn new(config: SimulationConfig) -> Self {
        log::info!(
            "Mock scanner: {}x{} frames, {} points/frame, seed {}",
            config.frame_width,
            config.frame_height,
            config.points_per_frame,
            config.random_seed
        );
        Self {
            hardware: MockHardware::new(config.clone()),
            calibration: MockCalibration::new(config.calibrated),
            processor: MockImageProcessor::new(config),
        }
    }

    pub fn hardware_state(&self) -> Arc<Mutex<MockHardwareState>> {
        self.hardware.state()
    }

    pub fn calibration_state(&self) -> Arc<Mutex<MockCalibrationState>> {
        self.calibration.state()
    }
}
