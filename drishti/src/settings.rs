//! Runtime scan settings and the in-memory settings store.
//!
//! Settings are what a client tweaks between scans (resolution, color mode,
//! camera picture controls, LED color). They are distinct from [`crate::config`],
//! which is the static daemon configuration loaded once from TOML.
//!
//! Updates arrive as JSON objects and are deep-merged into the current values,
//! so a client can send `{"camera": {"brightness": 60}}` without repeating the
//! rest of the document. A snapshot is written next to each finished scan as
//! `<scan_id>.fab`.

use crate::core::services::SettingsStore;
use crate::core::types::Rgb;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Camera picture controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    #[serde(default = "default_brightness")]
    pub brightness: i32,
    #[serde(default = "default_contrast")]
    pub contrast: i32,
    #[serde(default = "default_saturation")]
    pub saturation: i32,
}

fn default_brightness() -> i32 {
    50
}
fn default_contrast() -> i32 {
    40
}
fn default_saturation() -> i32 {
    50
}

impl CameraSettings {
    /// Fixed picture controls used while capturing texture frames
    pub const TEXTURE: CameraSettings = CameraSettings {
        brightness: 50,
        contrast: 0,
        saturation: 0,
    };
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            brightness: default_brightness(),
            contrast: default_contrast(),
            saturation: default_saturation(),
        }
    }
}

/// Runtime scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Turntable steps between two frames (frames per rotation = 3200 / resolution)
    #[serde(default = "default_resolution")]
    pub resolution: u32,
    /// Number of laser emitters used at each position
    #[serde(default = "default_laser_positions")]
    pub laser_positions: u32,
    /// Capture a texture pass before the laser pass
    #[serde(default = "default_color")]
    pub color: bool,
    #[serde(default)]
    pub camera: CameraSettings,
    /// LED color used during the laser pass
    #[serde(default = "default_led")]
    pub led: Rgb,
}

fn default_resolution() -> u32 {
    16
}
fn default_laser_positions() -> u32 {
    1
}
fn default_color() -> bool {
    true
}
fn default_led() -> Rgb {
    Rgb::gray(0)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            laser_positions: default_laser_positions(),
            color: default_color(),
            camera: CameraSettings::default(),
            led: default_led(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write settings as pretty JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Return a copy with `payload` deep-merged on top.
    ///
    /// Unknown keys are rejected so a typo does not silently vanish.
    pub fn merged(&self, payload: &Value) -> Result<Self> {
        if !payload.is_object() {
            return Err(Error::InvalidSettings(
                "settings update must be a JSON object".to_string(),
            ));
        }
        let mut current = serde_json::to_value(self)?;
        merge_known(&mut current, payload)?;
        Ok(serde_json::from_value(current)?)
    }
}

fn merge_known(target: &mut Value, patch: &Value) -> Result<()> {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(slot) if slot.is_object() && value.is_object() => {
                        merge_known(slot, value)?;
                    }
                    Some(slot) => *slot = value.clone(),
                    None => {
                        return Err(Error::InvalidSettings(format!(
                            "unknown setting '{}'",
                            key
                        )));
                    }
                }
            }
            Ok(())
        }
        (target, patch) => {
            *target = patch.clone();
            Ok(())
        }
    }
}

/// Thread-safe in-memory settings store
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    inner: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }

    fn update(&self, payload: &Value) -> Result<()> {
        let mut guard = self.inner.write();
        let updated = guard.merged(payload)?;
        log::debug!("Settings updated: {:?}", updated);
        *guard = updated;
        Ok(())
    }

    fn set_camera(&self, camera: CameraSettings) {
        self.inner.write().camera = camera;
    }
}
