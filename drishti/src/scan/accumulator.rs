//! Point cloud accumulator and progress tracker.
//!
//! Point append and progress increment happen under one lock, so concurrent
//! completions can neither lose points nor double count, and exactly one
//! caller observes [`RecordOutcome::Completed`].

use crate::core::types::PointRecord;
use parking_lot::Mutex;

/// What a single `record` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Frame counted, scan not finished yet
    Progress { progress: u32, total: u32 },
    /// This frame completed the scan (returned exactly once per session)
    Completed { progress: u32, total: u32 },
    /// Stale or late frame: wrong scan, closed or already completed
    Rejected,
}

#[derive(Debug, Default)]
struct Inner {
    scan_id: Option<String>,
    cloud: Vec<PointRecord>,
    progress: u32,
    total: u32,
    completed: bool,
}

/// Shared accumulator for one scan session at a time
#[derive(Debug, Default)]
pub struct ScanAccumulator {
    inner: Mutex<Inner>,
}

impl ScanAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session with a fresh, empty cloud
    pub fn open(&self, scan_id: &str, total: u32) {
        let mut inner = self.inner.lock();
        *inner = Inner {
            scan_id: Some(scan_id.to_string()),
            total,
            ..Default::default()
        };
    }

    /// Record one completed frame
    pub fn record(
        &self,
        scan_id: &str,
        points: Option<&[PointRecord]>,
        slots: u32,
    ) -> RecordOutcome {
        let mut inner = self.inner.lock();
        if inner.completed || inner.scan_id.as_deref() != Some(scan_id) {
            return RecordOutcome::Rejected;
        }

        if let Some(points) = points {
            inner.cloud.extend_from_slice(points);
        }
        inner.progress = inner.progress.saturating_add(slots).min(inner.total);

        let (progress, total) = (inner.progress, inner.total);
        if progress >= total {
            inner.completed = true;
            RecordOutcome::Completed { progress, total }
        } else {
            RecordOutcome::Progress { progress, total }
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().scan_id.is_some()
    }

    /// Points accumulated so far
    pub fn len(&self) -> usize {
        self.inner.lock().cloud.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(progress, total)`
    pub fn progress(&self) -> (u32, u32) {
        let inner = self.inner.lock();
        (inner.progress, inner.total)
    }

    /// Move the cloud out, leaving the session open but empty
    pub fn take_cloud(&self) -> Vec<PointRecord> {
        std::mem::take(&mut self.inner.lock().cloud)
    }

    /// End the session: drop the cloud and zero the counters
    pub fn close(&self) {
        *self.inner.lock() = Inner::default();
    }
}
