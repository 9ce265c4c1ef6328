//! Client notices and the in-process event bus.
//!
//! The orchestrator reports through [`EventSink`]. [`EventBus`] is the
//! in-process implementation: every subscriber gets its own unbounded
//! crossbeam channel and receives every [`BusEvent`] in publish order.
//! Subscribers that hang up are pruned on the next publish.
//!
//! Notice messages are stable machine-readable codes (`SCAN_COMPLETE`,
//! `NO_CAMERA_CONNECTION`, ...) so a frontend can translate them.

use crate::core::services::EventSink;
use crate::core::types::PointRecord;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Severity of a client notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
    Success,
}

/// Notice message codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeCode {
    ScanningTexture,
    ScanningObject,
    ScanCanceled,
    SavingPointCloud,
    ScanComplete,
    ScanSaveFailed,
    ScanAlreadyRunning,
    InvalidScanSettings,
    NoSerialConnection,
    NoCameraConnection,
    ScannerNotCalibrated,
}

/// Client-facing notice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: NoticeCode,
    /// Free-form extra data (e.g. `{"scan_id": "..."}`)
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: NoticeCode) -> Self {
        Self {
            level,
            message,
            payload: Value::Null,
        }
    }

    pub fn info(message: NoticeCode) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warn(message: NoticeCode) -> Self {
        Self::new(NoticeLevel::Warn, message)
    }

    pub fn error(message: NoticeCode) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    pub fn success(message: NoticeCode) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    /// Attach the scan id to the payload
    pub fn with_scan_id(mut self, scan_id: &str) -> Self {
        self.payload = json!({ "scan_id": scan_id });
        self
    }
}

/// Incremental progress, sent after every completed frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub scan_id: String,
    /// Points contributed by this frame (empty for texture frames)
    pub points: Vec<PointRecord>,
    pub progress: u32,
    pub total: u32,
}

/// Completion notification for downstream stages (e.g. mesh reconstruction)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCompleted {
    pub scan_id: String,
    pub point_count: usize,
}

/// Everything published on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BusEvent {
    Notice(Notice),
    Progress(ProgressUpdate),
    Completed(ScanCompleted),
}

/// Fan-out event bus over crossbeam channels
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<BusEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Events published before this call are not replayed.
    pub fn subscribe(&self) -> Receiver<BusEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Publish to every subscriber, dropping those that disconnected
    pub fn publish(&self, event: BusEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl EventSink for EventBus {
    fn notify(&self, notice: Notice) {
        log::debug!("Notice: {:?} {:?}", notice.level, notice.message);
        self.publish(BusEvent::Notice(notice));
    }

    fn progress(&self, update: ProgressUpdate) {
        log::trace!("Progress {}/{}", update.progress, update.total);
        self.publish(BusEvent::Progress(update));
    }

    fn scan_completed(&self, completed: ScanCompleted) {
        self.publish(BusEvent::Completed(completed));
    }
}
