//! Simulated turntable, laser, LED and camera
//!
//! All state lives behind an `Arc<Mutex<MockHardwareState>>` so a test can keep
//! a handle ([`MockHardware::state`]) after the controller itself has been
//! moved into the orchestrator, then inspect what the scanner was told to do.

use super::config::SimulationConfig;
use super::noise::NoiseGenerator;
use crate::core::driver::HardwareController;
use crate::core::types::{Frame, Rgb, StreamMode, STEPS_PER_ROTATION};
use crate::error::{Error, Result};
use crate::settings::CameraSettings;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Hardware call as seen by the mock, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    ScanAtPosition { steps: u32, color: bool },
    GetPicture,
    EnableMotors,
    DisableMotors,
    LaserOn(u8),
    LaserOff,
    LedOn(Rgb),
    LedOff,
    StartStream(StreamMode),
    StopStream,
    FlushStream,
    ApplyCamera(CameraSettings),
    FirmwareVersion,
    SettingsModeOn,
    SettingsModeOff,
}

/// Observable state of the simulated scanner
#[derive(Debug, Clone, Default)]
pub struct MockHardwareState {
    pub motors_enabled: bool,
    /// Active laser emitter
    pub laser: Option<u8>,
    pub led: Option<Rgb>,
    pub stream: Option<StreamMode>,
    pub settings_mode: bool,
    pub camera: CameraSettings,
    /// Total steps the turntable moved since power-on
    pub turntable_steps: u64,
    pub board_connected: bool,
    pub camera_connected: bool,
    pub calls: Vec<HardwareCall>,
}

impl MockHardwareState {
    /// Nothing moving, shining or streaming
    pub fn is_quiescent(&self) -> bool {
        !self.motors_enabled && self.laser.is_none() && self.led.is_none() && self.stream.is_none()
    }

    /// Number of frame grabs of the given kind
    pub fn acquisitions(&self, color: bool) -> usize {
        self.calls
            .iter()
            .filter(|call| {
                matches!(call, HardwareCall::ScanAtPosition { color: is_color, .. } if *is_color == color)
            })
            .count()
    }
}

/// Simulated scanner hardware
pub struct MockHardware {
    config: SimulationConfig,
    state: Arc<Mutex<MockHardwareState>>,
    noise: NoiseGenerator,
}

impl MockHardware {
    pub fn new(config: SimulationConfig) -> Self {
        let state = MockHardwareState {
            board_connected: config.board_connected,
            camera_connected: config.camera_connected,
            ..Default::default()
        };
        // Offset the seed so hardware and processor noise differ
        let noise = NoiseGenerator::new(config.random_seed.wrapping_mul(31));
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
            noise,
        }
    }

    /// Shared handle to the simulated state
    pub fn state(&self) -> Arc<Mutex<MockHardwareState>> {
        Arc::clone(&self.state)
    }

    fn record(&self, call: HardwareCall) {
        self.state.lock().calls.push(call);
    }

    fn require_board(&self) -> Result<()> {
        if self.state.lock().board_connected {
            Ok(())
        } else {
            Err(Error::NotConnected("controller board"))
        }
    }

    fn require_camera(&self) -> Result<()> {
        if self.state.lock().camera_connected {
            Ok(())
        } else {
            Err(Error::NotConnected("camera"))
        }
    }

    fn filled_frame(&self, pixel: [u8; 3]) -> Frame {
        let pixels = (self.config.frame_width * self.config.frame_height) as usize;
        let data = pixel.iter().copied().cycle().take(pixels * 3).collect();
        Frame::new(self.config.frame_width, self.config.frame_height, data)
    }

    /// Texture frame: hue follows the turntable angle
    fn texture_frame(&self, steps: u64) -> Frame {
        let phase = (steps % STEPS_PER_ROTATION as u64) as f32 / STEPS_PER_ROTATION as f32;
        let red = (phase * 255.0) as u8;
        self.filled_frame([red, 128, 255 - red])
    }

    /// Laser frame: dark image with one bright red column per active emitter
    fn laser_frame(&self, laser: Option<u8>) -> Frame {
        let mut frame = self.filled_frame([8, 8, 8]);
        if frame.data.is_empty() {
            return frame;
        }
        if let Some(index) = laser {
            let width = self.config.frame_width as usize;
            let column = (width / 2 + index as usize * 2).min(width.saturating_sub(1));
            for row in 0..self.config.frame_height as usize {
                let offset = (row * width + column) * 3;
                frame.data[offset] = 255;
            }
        }
        frame
    }
}

impl HardwareController for MockHardware {
    fn scan_at_position(&mut self, steps: u32, color: bool) -> Result<Frame> {
        self.record(HardwareCall::ScanAtPosition { steps, color });
        self.require_board()?;
        self.require_camera()?;

        if self.config.acquisition_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.acquisition_delay_ms));
        }
        if self.noise.chance(self.config.acquisition_failure_rate) {
            return Err(Error::Hardware("simulated frame grab failure".to_string()));
        }

        let (total_steps, laser) = {
            let mut state = self.state.lock();
            if !state.motors_enabled {
                return Err(Error::Hardware("turntable motors disabled".to_string()));
            }
            state.turntable_steps += steps as u64;
            (state.turntable_steps, state.laser)
        };

        Ok(if color {
            self.texture_frame(total_steps)
        } else {
            self.laser_frame(laser)
        })
    }

    fn get_picture(&mut self) -> Result<Frame> {
        self.record(HardwareCall::GetPicture);
        self.require_camera()?;
        let led = self.state.lock().led.unwrap_or(Rgb::gray(64));
        Ok(self.filled_frame([led.red, led.green, led.blue]))
    }

    fn enable_motors(&mut self) -> Result<()> {
        self.record(HardwareCall::EnableMotors);
        self.require_board()?;
        self.state.lock().motors_enabled = true;
        Ok(())
    }

    fn disable_motors(&mut self) -> Result<()> {
        self.record(HardwareCall::DisableMotors);
        self.require_board()?;
        self.state.lock().motors_enabled = false;
        Ok(())
    }

    fn laser_on(&mut self, index: u8) -> Result<()> {
        self.record(HardwareCall::LaserOn(index));
        self.require_board()?;
        self.state.lock().laser = Some(index);
        Ok(())
    }

    fn laser_off(&mut self) -> Result<()> {
        self.record(HardwareCall::LaserOff);
        self.require_board()?;
        self.state.lock().laser = None;
        Ok(())
    }

    fn led_on(&mut self, color: Rgb) -> Result<()> {
        self.record(HardwareCall::LedOn(color));
        self.require_board()?;
        self.state.lock().led = Some(color);
        Ok(())
    }

    fn led_off(&mut self) -> Result<()> {
        self.record(HardwareCall::LedOff);
        self.require_board()?;
        self.state.lock().led = None;
        Ok(())
    }

    fn start_stream(&mut self, mode: StreamMode) -> Result<()> {
        self.record(HardwareCall::StartStream(mode));
        self.require_camera()?;
        self.state.lock().stream = Some(mode);
        Ok(())
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.record(HardwareCall::StopStream);
        self.state.lock().stream = None;
        Ok(())
    }

    fn flush_stream(&mut self) -> Result<()> {
        self.record(HardwareCall::FlushStream);
        Ok(())
    }

    fn apply_camera_settings(&mut self, camera: &CameraSettings) -> Result<()> {
        self.record(HardwareCall::ApplyCamera(*camera));
        self.require_camera()?;
        self.state.lock().camera = *camera;
        Ok(())
    }

    fn board_connected(&self) -> bool {
        self.state.lock().board_connected
    }

    fn camera_connected(&self) -> bool {
        self.state.lock().camera_connected
    }

    fn firmware_version(&mut self) -> Result<String> {
        self.record(HardwareCall::FirmwareVersion);
        self.require_board()?;
        Ok(self.config.firmware_version.clone())
    }

    fn settings_mode_on(&mut self) -> Result<()> {
        self.record(HardwareCall::SettingsModeOn);
        self.require_board()?;
        let mut state = self.state.lock();
        state.settings_mode = true;
        state.laser = Some(0);
        state.led = Some(Rgb::gray(255));
        Ok(())
    }

    fn settings_mode_off(&mut self) -> Result<()> {
        self.record(HardwareCall::SettingsModeOff);
        let mut state = self.state.lock();
        if state.settings_mode {
            state.settings_mode = false;
            state.laser = None;
            state.led = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_requires_motors() {
        let mut hw = MockHardware::new(SimulationConfig::default());
        assert!(hw.scan_at_position(200, false).is_err());

        hw.enable_motors().unwrap();
        let frame = hw.scan_at_position(200, false).unwrap();
        assert_eq!(frame.data.len(), frame.pixel_count() * 3);
        assert_eq!(hw.state().lock().turntable_steps, 200);
    }

    #[test]
    fn test_laser_frame_has_red_column() {
        let mut hw = MockHardware::new(SimulationConfig::default());
        hw.enable_motors().unwrap();
        hw.laser_on(0).unwrap();
        let frame = hw.scan_at_position(16, false).unwrap();

        let width = frame.width as usize;
        let bright = frame
            .data
            .chunks(3)
            .enumerate()
            .filter(|(_, px)| px[0] == 255)
            .map(|(i, _)| i % width)
            .collect::<Vec<_>>();
        assert_eq!(bright.len(), frame.height as usize);
        assert!(bright.iter().all(|c| *c == width / 2));
    }

    #[test]
    fn test_zero_width_laser_frame_is_empty() {
        let config = SimulationConfig {
            frame_width: 0,
            ..Default::default()
        };
        let mut hw = MockHardware::new(config);
        hw.enable_motors().unwrap();
        hw.laser_on(0).unwrap();
        let frame = hw.scan_at_position(0, false).unwrap();
        assert!(frame.data.is_empty());
    }

    #[test]
    fn test_disconnected_camera_fails_acquisition() {
        let config = SimulationConfig {
            camera_connected: false,
            ..Default::default()
        };
        let mut hw = MockHardware::new(config);
        hw.enable_motors().unwrap();
        assert!(matches!(
            hw.scan_at_position(16, true),
            Err(Error::NotConnected("camera"))
        ));
        assert!(!hw.camera_connected());
        assert!(hw.board_connected());
    }

    #[test]
    fn test_state_and_call_log() {
        let mut hw = MockHardware::new(SimulationConfig::default());
        let state = hw.state();

        hw.led_on(Rgb::gray(50)).unwrap();
        hw.start_stream(StreamMode::Flash).unwrap();
        assert!(!state.lock().is_quiescent());

        hw.led_off().unwrap();
        hw.stop_stream().unwrap();
        assert!(state.lock().is_quiescent());
        assert_eq!(
            state.lock().calls,
            vec![
                HardwareCall::LedOn(Rgb::gray(50)),
                HardwareCall::StartStream(StreamMode::Flash),
                HardwareCall::LedOff,
                HardwareCall::StopStream,
            ]
        );
    }
}
