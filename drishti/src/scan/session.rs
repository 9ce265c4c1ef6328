//! Scan geometry and per-scan session state.

use crate::core::types::{TaskKind, STEPS_PER_ROTATION};
use crate::error::{Error, Result};
use crate::settings::Settings;
use serde::{Deserialize, Serialize};

/// Scan phase as seen by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Idle,
    /// Capturing color frames under LED light
    Texture,
    /// Capturing laser frames
    Object,
    /// Waiting for the queue, then persisting the cloud
    Finalizing,
}

/// Frame layout of a scan, fixed at START
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanGeometry {
    /// Turntable steps between two positions
    pub resolution_steps: u32,
    pub laser_positions: u32,
    pub color: bool,
}

impl ScanGeometry {
    pub fn new(resolution_steps: u32, laser_positions: u32, color: bool) -> Result<Self> {
        if resolution_steps == 0 || resolution_steps > STEPS_PER_ROTATION {
            return Err(Error::InvalidSettings(format!(
                "resolution must be within 1..={}, got {}",
                STEPS_PER_ROTATION, resolution_steps
            )));
        }
        if laser_positions == 0 || laser_positions > u8::MAX as u32 + 1 {
            return Err(Error::InvalidSettings(format!(
                "laser_positions must be within 1..=256, got {}",
                laser_positions
            )));
        }
        Ok(Self {
            resolution_steps,
            laser_positions,
            color,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(settings.resolution, settings.laser_positions, settings.color)
    }

    /// Positions per full rotation (N)
    pub fn frames_per_rotation(&self) -> u32 {
        STEPS_PER_ROTATION / self.resolution_steps
    }

    /// Progress slots of the whole scan
    pub fn expected_total(&self) -> u32 {
        let phases = if self.color { 2 } else { 1 };
        self.frames_per_rotation() * phases * self.laser_positions
    }

    /// Turntable steps to move before grabbing at `position`.
    ///
    /// Position 0 grabs in place, so position N lands back on the start angle.
    pub fn steps_before(&self, position: u32) -> u32 {
        if position == 0 {
            0
        } else {
            self.resolution_steps
        }
    }

    /// Progress slots carried by one frame at `position`.
    ///
    /// A texture frame stands for every laser of its position; a laser frame
    /// for itself. The wrap-around frame at position N repeats position 0 and
    /// carries none.
    pub fn slots_for(&self, position: u32, kind: TaskKind) -> u32 {
        if position >= self.frames_per_rotation() {
            return 0;
        }
        match kind {
            TaskKind::ProcessColorImage => self.laser_positions,
            TaskKind::ProcessLaserImage => 1,
        }
    }
}

/// State of the scan in progress
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub scan_id: String,
    /// Sequence number tagging the internal step messages of this session
    pub seq: u64,
    pub geometry: ScanGeometry,
    /// Settings as they were at START (written as the sidecar)
    pub settings: Settings,
    /// Next position to acquire in the active phase
    pub current_position: u32,
    pub cancel_requested: bool,
    /// Progress reached total before the laser loop finished
    pub completion_pending: bool,
}

impl ScanSession {
    pub fn new(scan_id: String, seq: u64, settings: Settings) -> Result<Self> {
        let geometry = ScanGeometry::from_settings(&settings)?;
        Ok(Self {
            scan_id,
            seq,
            geometry,
            settings,
            current_position: 0,
            cancel_requested: false,
            completion_pending: false,
        })
    }

    /// Whether the active phase still has positions to acquire
    pub fn acquiring(&self) -> bool {
        self.current_position <= self.geometry.frames_per_rotation()
    }
}

/// Generates scan ids from the local time, unique within the process
#[derive(Debug, Default)]
pub struct ScanIdGenerator {
    last_base: String,
    repeats: u32,
}

impl ScanIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        let base = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        self.next_for(base)
    }

    fn next_for(&mut self, base: String) -> String {
        if base == self.last_base {
            self.repeats += 1;
            format!("{}-{}", base, self.repeats)
        } else {
            self.last_base = base.clone();
            self.repeats = 0;
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_per_rotation_and_total() {
        let mono = ScanGeometry::new(200, 1, false).unwrap();
        assert_eq!(mono.frames_per_rotation(), 16);
        assert_eq!(mono.expected_total(), 16);

        let color = ScanGeometry::new(200, 2, true).unwrap();
        assert_eq!(color.expected_total(), 64);

        let fine = ScanGeometry::new(16, 1, true).unwrap();
        assert_eq!(fine.frames_per_rotation(), 200);
        assert_eq!(fine.expected_total(), 400);
    }

    #[test]
    fn test_slots_add_up_to_total() {
        for (res, lasers, color) in [(200, 1, false), (200, 2, true), (400, 3, true)] {
            let g = ScanGeometry::new(res, lasers, color).unwrap();
            let n = g.frames_per_rotation();
            let mut sum = 0;
            for position in 0..=n {
                if g.color {
                    sum += g.slots_for(position, TaskKind::ProcessColorImage);
                }
                for _ in 0..g.laser_positions {
                    sum += g.slots_for(position, TaskKind::ProcessLaserImage);
                }
            }
            assert_eq!(sum, g.expected_total());
        }
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(ScanGeometry::new(0, 1, false).is_err());
        assert!(ScanGeometry::new(3201, 1, false).is_err());
        assert!(ScanGeometry::new(200, 0, false).is_err());
        assert!(ScanGeometry::new(3200, 1, false).is_ok());
    }

    #[test]
    fn test_steps_before() {
        let g = ScanGeometry::new(200, 1, false).unwrap();
        assert_eq!(g.steps_before(0), 0);
        let moved: u32 = (0..=g.frames_per_rotation()).map(|p| g.steps_before(p)).sum();
        assert_eq!(moved, STEPS_PER_ROTATION);
    }

    #[test]
    fn test_session_acquires_n_plus_one_positions() {
        let settings = Settings {
            resolution: 200,
            ..Default::default()
        };
        let mut session = ScanSession::new("id".to_string(), 1, settings).unwrap();
        let mut steps = 0;
        while session.acquiring() {
            session.current_position += 1;
            steps += 1;
        }
        assert_eq!(steps, 17);
    }

    #[test]
    fn test_scan_ids_unique_within_second() {
        let mut ids = ScanIdGenerator::new();
        let a = ids.next_for("20240101-120000".to_string());
        let b = ids.next_for("20240101-120000".to_string());
        let c = ids.next_for("20240101-120001".to_string());
        assert_eq!(a, "20240101-120000");
        assert_eq!(b, "20240101-120000-1");
        assert_eq!(c, "20240101-120001");

        let live = ids.next_id();
        assert_eq!(live.len(), 15);
    }
}
