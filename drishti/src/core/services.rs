//! Collaborator traits consumed by the scan orchestrator.
//!
//! Everything the orchestrator needs besides the hardware is injected through
//! one of these traits. None of them is a global: the daemon builds concrete
//! instances in `main.rs` and hands them over in [`crate::scan::OrchestratorParts`].

use crate::core::types::{Frame, ImageTask, PointRecord, ProcessedFrame};
use crate::error::Result;
use crate::events::{Notice, ProgressUpdate, ScanCompleted};
use crate::settings::{CameraSettings, Settings};
use serde_json::Value;
use std::path::PathBuf;

/// Vision pipeline turning frames into 3D points.
///
/// Shared by all workers, so implementations must be `Sync`.
pub trait ImageProcessor: Send + Sync {
    /// Process one scan frame.
    ///
    /// Laser frames yield colored points; texture frames usually yield none.
    fn process(&self, task: &ImageTask) -> Result<ProcessedFrame>;

    /// Lightweight transforms for the live preview streams
    fn texture_stream_frame(&self, frame: Frame) -> Result<Frame>;
    fn laser_stream_frame(&self, frame: Frame) -> Result<Frame>;
    fn calibration_stream_frame(&self, frame: Frame) -> Result<Frame>;
}

/// Calibration lifecycle. The calibration algorithm itself lives elsewhere.
pub trait Calibration: Send {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;
    /// Whether a camera/laser calibration is available
    fn is_calibrated(&self) -> bool;
}

/// Source of the runtime scan settings
pub trait SettingsStore: Send + Sync {
    fn snapshot(&self) -> Settings;
    /// Deep-merge a JSON object into the current settings
    fn update(&self, payload: &Value) -> Result<()>;
    fn set_camera(&self, camera: CameraSettings);
}

/// Durable storage for scan artifacts, namespaced by scan id
pub trait ScanStorage: Send {
    /// Persist the whole point cloud, returning the written file
    fn save_point_cloud(&self, scan_id: &str, points: &[PointRecord]) -> Result<PathBuf>;
    /// Persist the settings sidecar, returning the written file
    fn save_settings(&self, scan_id: &str, settings: &Settings) -> Result<PathBuf>;
    /// Remove per-frame intermediate images of a finished scan
    fn delete_image_folders(&self, scan_id: &str) -> Result<()>;
    /// Remove every artifact of a scan
    fn delete_scan(&self, scan_id: &str) -> Result<()>;
}

/// Outbound notifications to clients and downstream stages
pub trait EventSink: Send + Sync {
    /// Client-facing notice (info/warn/error/success)
    fn notify(&self, notice: Notice);
    /// Per-frame progress
    fn progress(&self, update: ProgressUpdate);
    /// Scan finished and persisted
    fn scan_completed(&self, completed: ScanCompleted);
}
