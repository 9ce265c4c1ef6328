//! Simulated vision pipeline
//!
//! Laser frames become a vertical line of points on a cylinder whose
//! orientation follows the turntable angle. Texture frames produce nothing
//! (the texture is consumed when laser points are colored).

use super::config::SimulationConfig;
use super::noise::NoiseGenerator;
use crate::core::services::ImageProcessor;
use crate::core::types::{Frame, ImageTask, PointRecord, ProcessedFrame, TaskKind};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::thread;
use std::time::Duration;

/// Simulated image processor, shared by all workers
pub struct MockImageProcessor {
    config: SimulationConfig,
    noise: Mutex<NoiseGenerator>,
}

impl MockImageProcessor {
    pub fn new(config: SimulationConfig) -> Self {
        let noise = Mutex::new(NoiseGenerator::new(config.random_seed));
        Self { config, noise }
    }

    fn laser_points(&self, task: &ImageTask) -> Vec<PointRecord> {
        let theta = task.angle_deg().to_radians();
        let count = self.config.points_per_frame;
        let step = if count > 1 {
            self.config.object_height / (count - 1) as f32
        } else {
            0.0
        };
        let shade = (task.angle_deg() / 360.0 * 255.0) as u8;

        let mut noise = self.noise.lock();
        (0..count)
            .map(|i| {
                let radius = self.config.object_radius + noise.gaussian(self.config.noise_stddev);
                PointRecord {
                    x: radius * theta.cos(),
                    y: radius * theta.sin(),
                    z: step * i as f32,
                    r: shade,
                    g: 128,
                    b: 255 - shade,
                }
            })
            .collect()
    }

    fn check_frame(frame: &Frame) -> Result<()> {
        if frame.data.len() != frame.pixel_count() * 3 || frame.data.is_empty() {
            return Err(Error::Processing(format!(
                "malformed {}x{} frame ({} bytes)",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        Ok(())
    }
}

impl ImageProcessor for MockImageProcessor {
    fn process(&self, task: &ImageTask) -> Result<ProcessedFrame> {
        Self::check_frame(&task.frame)?;
        if self.config.processing_delay_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.processing_delay_ms));
        }
        if self.noise.lock().chance(self.config.processing_failure_rate) {
            return Err(Error::Processing(format!(
                "simulated failure at position {}",
                task.position
            )));
        }

        let points = match task.kind {
            TaskKind::ProcessColorImage => Vec::new(),
            TaskKind::ProcessLaserImage => self.laser_points(task),
        };
        Ok(ProcessedFrame { points })
    }

    fn texture_stream_frame(&self, frame: Frame) -> Result<Frame> {
        Self::check_frame(&frame)?;
        Ok(frame)
    }

    /// Keep only pixels bright enough in red to be laser light
    fn laser_stream_frame(&self, mut frame: Frame) -> Result<Frame> {
        Self::check_frame(&frame)?;
        for px in frame.data.chunks_mut(3) {
            let lit = if px[0] > 128 { 255 } else { 0 };
            px.copy_from_slice(&[lit, 0, 0]);
        }
        Ok(frame)
    }

    /// Grayscale preview for pattern alignment
    fn calibration_stream_frame(&self, mut frame: Frame) -> Result<Frame> {
        Self::check_frame(&frame)?;
        for px in frame.data.chunks_mut(3) {
            let luma = ((px[0] as u16 * 3 + px[1] as u16 * 6 + px[2] as u16) / 10) as u8;
            px.copy_from_slice(&[luma, luma, luma]);
        }
        Ok(frame)
    }
}
