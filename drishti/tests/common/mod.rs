//! Shared harness: a mock scanner behind a running orchestrator thread.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use drishti::config::ScannerConfig;
use drishti::devices::mock::{
    MockCalibrationState, MockHardwareState, MockScanner, SimulationConfig,
};
use drishti::events::{BusEvent, EventBus, NoticeCode, NoticeLevel, ScanCompleted};
use drishti::scan::{OrchestratorParts, OrchestratorThread, ScanHandle, ScanOrchestrator};
use drishti::settings::{MemorySettingsStore, Settings};
use drishti::storage::FsScanStorage;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestScanner {
    pub handle: ScanHandle,
    pub thread: Option<OrchestratorThread>,
    pub hardware: Arc<Mutex<MockHardwareState>>,
    pub calibration: Arc<Mutex<MockCalibrationState>>,
    pub settings: Arc<MemorySettingsStore>,
    pub events: Receiver<BusEvent>,
    pub seen: Vec<BusEvent>,
    pub scans: TempDir,
}

impl TestScanner {
    pub fn new(settings: Settings, simulation: SimulationConfig) -> Self {
        let scans = tempfile::tempdir().unwrap();
        let scanner = MockScanner::new(simulation);
        let hardware = scanner.hardware_state();
        let calibration = scanner.calibration_state();

        let settings = Arc::new(MemorySettingsStore::new(settings));
        let bus = Arc::new(EventBus::new());
        let events = bus.subscribe();

        let parts = OrchestratorParts::new(
            scanner.into(),
            settings.clone(),
            Box::new(FsScanStorage::new(scans.path())),
            bus,
        );
        let config = ScannerConfig {
            process_numbers: 3,
            drain_poll_interval_ms: 2,
            ..Default::default()
        };
        let (handle, thread) = ScanOrchestrator::spawn(config, parts).unwrap();

        Self {
            handle,
            thread: Some(thread),
            hardware,
            calibration,
            settings,
            events,
            seen: Vec::new(),
            scans,
        }
    }

    pub fn mono(resolution: u32) -> Self {
        let settings = Settings {
            resolution,
            color: false,
            ..Default::default()
        };
        Self::new(settings, SimulationConfig::default())
    }

    pub fn scans_root(&self) -> &Path {
        self.scans.path()
    }

    /// Receive events until `done` matches one, keeping everything seen
    pub fn wait_for<F>(&mut self, done: F) -> BusEvent
    where
        F: Fn(&BusEvent) -> bool,
    {
        let deadline = Instant::now() + TIMEOUT;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            let event = self
                .events
                .recv_timeout(left)
                .expect("timed out waiting for event");
            self.seen.push(event.clone());
            if done(&event) {
                return event;
            }
        }
    }

    pub fn wait_for_notice(&mut self, code: NoticeCode) -> BusEvent {
        self.wait_for(|e| matches!(e, BusEvent::Notice(n) if n.message == code))
    }

    pub fn wait_for_completion(&mut self) -> ScanCompleted {
        match self.wait_for(|e| matches!(e, BusEvent::Completed(_))) {
            BusEvent::Completed(done) => done,
            _ => unreachable!(),
        }
    }

    /// Collect whatever arrives within `quiet`
    pub fn drain_events(&mut self, quiet: Duration) {
        while let Ok(event) = self.events.recv_timeout(quiet) {
            self.seen.push(event);
        }
    }

    pub fn notices(&self) -> Vec<(NoticeLevel, NoticeCode)> {
        self.seen
            .iter()
            .filter_map(|e| match e {
                BusEvent::Notice(n) => Some((n.level, n.message)),
                _ => None,
            })
            .collect()
    }

    pub fn count_notices(&self, code: NoticeCode) -> usize {
        self.notices().iter().filter(|(_, c)| *c == code).count()
    }
}

impl Drop for TestScanner {
    fn drop(&mut self) {
        self.handle.send(drishti::ScanCommand::Shutdown).ok();
        if let Some(thread) = self.thread.take() {
            thread.join().ok();
        }
    }
}
