//! Core data types shared between the orchestrator, workers and devices.
//!
//! Key types for collaborator implementers:
//! - [`Frame`]: Raw camera image as delivered by the hardware controller
//! - [`ImageTask`]: Immutable unit of work handed to a processing worker
//! - [`PointRecord`]: One colored 3D point produced by the vision pipeline
//! - [`FrameResult`]: Completion event posted by a worker back to the orchestrator

use serde::{Deserialize, Serialize};

/// Turntable steps per full revolution (fixed by the stepper/gear ratio)
pub const STEPS_PER_ROTATION: u32 = 3200;

/// Raw camera frame (packed RGB8)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a new frame stamped with the current time
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        let mut frame = Self {
            width,
            height,
            timestamp_us: 0,
            data,
        };
        frame.touch();
        frame
    }

    /// Update timestamp to current time
    #[inline]
    pub fn touch(&mut self) {
        self.timestamp_us = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
    }

    /// Number of pixels in the frame
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

/// RGB triple for LED illumination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Same intensity on all three channels
    pub const fn gray(level: u8) -> Self {
        Self::new(level, level, level)
    }
}

/// Camera streaming profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Flash exposure used while capturing texture frames
    Flash,
    /// Regular exposure used while capturing laser lines
    Laser,
}

/// Kind of processing a task requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    ProcessColorImage,
    ProcessLaserImage,
}

/// Unit of work queued for a worker: one frame plus its processing kind.
///
/// Ownership transfers to the worker on enqueue; the worker never mutates it.
#[derive(Debug, Clone)]
pub struct ImageTask {
    pub frame: Frame,
    pub scan_id: String,
    pub position: u32,
    pub frames_per_rotation: u32,
    /// Laser emitter that was on while the frame was taken (0 for texture)
    pub laser_index: u8,
    pub kind: TaskKind,
    /// Progress slots this frame consumes once completed (0 for the wrap-around frame)
    pub progress_slots: u32,
}

impl ImageTask {
    /// Turntable angle of this frame in degrees
    pub fn angle_deg(&self) -> f32 {
        if self.frames_per_rotation == 0 {
            return 0.0;
        }
        360.0 * self.position as f32 / self.frames_per_rotation as f32
    }
}

/// One colored point of the cloud
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Output of the vision pipeline for a single frame
#[derive(Debug, Clone, Default)]
pub struct ProcessedFrame {
    pub points: Vec<PointRecord>,
}

/// Completion event a worker posts back to the orchestrator
#[derive(Debug, Clone)]
pub struct FrameResult {
    pub scan_id: String,
    pub position: u32,
    pub kind: TaskKind,
    pub progress_slots: u32,
    /// 3D geometry for laser frames; `None` for texture frames and dropped frames
    pub points: Option<Vec<PointRecord>>,
}

impl FrameResult {
    /// Completion without geometry (texture frame or dropped frame)
    pub fn empty(task: &ImageTask) -> Self {
        Self {
            scan_id: task.scan_id.clone(),
            position: task.position,
            kind: task.kind,
            progress_slots: task.progress_slots,
            points: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(position: u32, frames: u32) -> ImageTask {
        ImageTask {
            frame: Frame::new(2, 2, vec![0; 12]),
            scan_id: "20240101-120000".to_string(),
            position,
            frames_per_rotation: frames,
            laser_index: 0,
            kind: TaskKind::ProcessLaserImage,
            progress_slots: 1,
        }
    }

    #[test]
    fn test_angle_from_position() {
        assert_eq!(task(0, 16).angle_deg(), 0.0);
        assert_eq!(task(4, 16).angle_deg(), 90.0);
        assert_eq!(task(16, 16).angle_deg(), 360.0);
        assert_eq!(task(3, 0).angle_deg(), 0.0);
    }

    #[test]
    fn test_empty_result_keeps_identity() {
        let t = task(7, 16);
        let result = FrameResult::empty(&t);
        assert_eq!(result.scan_id, t.scan_id);
        assert_eq!(result.position, 7);
        assert_eq!(result.progress_slots, 1);
        assert!(result.points.is_none());
    }

    #[test]
    fn test_task_kind_wire_names() {
        let json = serde_json::to_string(&TaskKind::ProcessColorImage).unwrap();
        assert_eq!(json, "\"PROCESS_COLOR_IMAGE\"");
        let json = serde_json::to_string(&TaskKind::ProcessLaserImage).unwrap();
        assert_eq!(json, "\"PROCESS_LASER_IMAGE\"");
    }
}
