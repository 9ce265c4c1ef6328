//! Mock scanner simulation configuration
//!
//! Every parameter has a default so `[device.simulation]` can be omitted.
//! The simulated object is a cylinder standing on the turntable; each laser
//! frame yields one vertical line of points on its surface.

use serde::{Deserialize, Serialize};

/// Simulation parameters for the mock device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Simulated camera frame size (pixels)
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,

    /// Time spent per frame grab (turntable move + exposure)
    #[serde(default)]
    pub acquisition_delay_ms: u64,
    /// Time a worker spends processing one frame
    #[serde(default)]
    pub processing_delay_ms: u64,

    /// Points produced per laser frame
    #[serde(default = "default_points_per_frame")]
    pub points_per_frame: usize,
    /// Radius of the simulated object (mm)
    #[serde(default = "default_object_radius")]
    pub object_radius: f32,
    /// Height of the simulated object (mm)
    #[serde(default = "default_object_height")]
    pub object_height: f32,
    /// Radial jitter standard deviation (mm)
    #[serde(default = "default_noise_stddev")]
    pub noise_stddev: f32,
    /// 0 = random each run
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,

    /// Probability that a frame grab fails
    #[serde(default)]
    pub acquisition_failure_rate: f32,
    /// Probability that processing a frame fails
    #[serde(default)]
    pub processing_failure_rate: f32,

    #[serde(default = "default_true")]
    pub board_connected: bool,
    #[serde(default = "default_true")]
    pub camera_connected: bool,
    #[serde(default = "default_true")]
    pub calibrated: bool,
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,
}

fn default_frame_width() -> u32 {
    32
}
fn default_frame_height() -> u32 {
    24
}
fn default_points_per_frame() -> usize {
    24
}
fn default_object_radius() -> f32 {
    60.0
}
fn default_object_height() -> f32 {
    120.0
}
fn default_noise_stddev() -> f32 {
    0.2
}
fn default_random_seed() -> u64 {
    42
}
fn default_true() -> bool {
    true
}
fn default_firmware_version() -> String {
    "FabScanPi-Mock v1.0".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            acquisition_delay_ms: 0,
            processing_delay_ms: 0,
            points_per_frame: default_points_per_frame(),
            object_radius: default_object_radius(),
            object_height: default_object_height(),
            noise_stddev: default_noise_stddev(),
            random_seed: default_random_seed(),
            acquisition_failure_rate: 0.0,
            processing_failure_rate: 0.0,
            board_connected: true,
            camera_connected: true,
            calibrated: true,
            firmware_version: default_firmware_version(),
        }
    }
}
