//! HardwareController trait definition

use crate::core::types::{Frame, Rgb, StreamMode};
use crate::error::Result;
use crate::settings::CameraSettings;

/// Hardware abstraction for a turntable laser scanner.
///
/// The controller is owned by the scan orchestrator and only ever driven from
/// its command thread, so implementations need `Send` but not `Sync`.
pub trait HardwareController: Send {
    /// Rotate the turntable by `steps` and grab one frame.
    ///
    /// `color` selects a texture frame (flash exposure, no laser) instead of a
    /// laser frame.
    fn scan_at_position(&mut self, steps: u32, color: bool) -> Result<Frame>;

    /// Grab a frame without moving the turntable
    fn get_picture(&mut self) -> Result<Frame>;

    fn enable_motors(&mut self) -> Result<()>;
    fn disable_motors(&mut self) -> Result<()>;

    /// Switch on one laser emitter (0-based), switching off the others
    fn laser_on(&mut self, index: u8) -> Result<()>;
    fn laser_off(&mut self) -> Result<()>;

    fn led_on(&mut self, color: Rgb) -> Result<()>;
    fn led_off(&mut self) -> Result<()>;

    fn start_stream(&mut self, mode: StreamMode) -> Result<()>;
    fn stop_stream(&mut self) -> Result<()>;
    /// Drop any frames buffered by the camera
    fn flush_stream(&mut self) -> Result<()>;

    /// Push picture controls (brightness, contrast, saturation) to the camera
    fn apply_camera_settings(&mut self, camera: &CameraSettings) -> Result<()>;

    /// Whether the controller board answers on its serial link
    fn board_connected(&self) -> bool;
    fn camera_connected(&self) -> bool;

    fn firmware_version(&mut self) -> Result<String>;

    /// Settings mode keeps laser and LED on for live adjustment by the client
    fn settings_mode_on(&mut self) -> Result<()>;
    fn settings_mode_off(&mut self) -> Result<()>;
}
