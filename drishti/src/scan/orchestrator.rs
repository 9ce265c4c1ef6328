//! Scan orchestrator thread.
//!
//! Owns the hardware and the scan session. A scan is a chain of small steps:
//! each step does one hardware action, enqueues the resulting task and posts
//! the next step to the orchestrator's own step channel. The main loop selects
//! over client commands, steps and worker results, so a STOP or a status query
//! is served between any two frames.

use super::accumulator::{RecordOutcome, ScanAccumulator};
use super::commands::{CommandReply, Request, ScanCommand, ScanHandle, ScanStatus};
use super::queue::TaskQueue;
use super::session::{ScanIdGenerator, ScanPhase, ScanSession};
use super::workers::WorkerPool;
use crate::config::ScannerConfig;
use crate::core::driver::HardwareController;
use crate::core::services::{Calibration, EventSink, ImageProcessor, ScanStorage, SettingsStore};
use crate::core::types::{Frame, FrameResult, ImageTask, Rgb, StreamMode, TaskKind};
use crate::devices::DeviceSet;
use crate::error::{Error, Result};
use crate::events::{Notice, NoticeCode, ProgressUpdate, ScanCompleted};
use crate::settings::CameraSettings;
use crossbeam_channel::{select, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Collaborators injected into the orchestrator
pub struct OrchestratorParts {
    pub hardware: Box<dyn HardwareController>,
    pub processor: Arc<dyn ImageProcessor>,
    pub calibration: Box<dyn Calibration>,
    pub settings: Arc<dyn SettingsStore>,
    pub storage: Box<dyn ScanStorage>,
    pub events: Arc<dyn EventSink>,
}

impl OrchestratorParts {
    pub fn new(
        devices: DeviceSet,
        settings: Arc<dyn SettingsStore>,
        storage: Box<dyn ScanStorage>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            hardware: devices.hardware,
            processor: devices.processor,
            calibration: devices.calibration,
            settings,
            storage,
            events,
        }
    }
}

/// Internal continuation messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Texture,
    Object,
}

#[derive(Debug, Clone, Copy)]
struct Step {
    seq: u64,
    kind: StepKind,
}

/// Scan state machine, run on its own thread
pub struct ScanOrchestrator {
    config: ScannerConfig,
    hardware: Box<dyn HardwareController>,
    processor: Arc<dyn ImageProcessor>,
    calibration: Box<dyn Calibration>,
    settings: Arc<dyn SettingsStore>,
    storage: Box<dyn ScanStorage>,
    events: Arc<dyn EventSink>,

    queue: TaskQueue,
    pool: WorkerPool,
    accumulator: ScanAccumulator,

    commands: Receiver<Request>,
    steps_tx: Sender<Step>,
    steps: Receiver<Step>,
    results_tx: Sender<FrameResult>,
    results: Receiver<FrameResult>,

    phase: ScanPhase,
    session: Option<ScanSession>,
    /// Camera controls to restore after the texture pass
    saved_camera: Option<CameraSettings>,
    settings_mode: bool,
    calibrating: bool,
    ids: ScanIdGenerator,
    next_seq: u64,
}

/// Running orchestrator thread
pub struct OrchestratorThread {
    handle: JoinHandle<()>,
}

impl OrchestratorThread {
    /// Wait for the orchestrator to leave its loop
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl ScanOrchestrator {
    pub fn new(config: ScannerConfig, parts: OrchestratorParts) -> (Self, ScanHandle) {
        let (commands_tx, commands) = crossbeam_channel::unbounded();
        let (steps_tx, steps) = crossbeam_channel::unbounded();
        let (results_tx, results) = crossbeam_channel::unbounded();

        let queue = TaskQueue::new(config.queue_capacity());
        let pool = WorkerPool::new(
            config.process_numbers,
            Arc::clone(&parts.processor),
            queue.receiver(),
            results_tx.clone(),
        );

        let orchestrator = Self {
            config,
            hardware: parts.hardware,
            processor: parts.processor,
            calibration: parts.calibration,
            settings: parts.settings,
            storage: parts.storage,
            events: parts.events,
            queue,
            pool,
            accumulator: ScanAccumulator::new(),
            commands,
            steps_tx,
            steps,
            results_tx,
            results,
            phase: ScanPhase::Idle,
            session: None,
            saved_camera: None,
            settings_mode: false,
            calibrating: false,
            ids: ScanIdGenerator::new(),
            next_seq: 0,
        };
        (orchestrator, ScanHandle::new(commands_tx))
    }

    /// Build the orchestrator and run it on a named thread
    pub fn spawn(
        config: ScannerConfig,
        parts: OrchestratorParts,
    ) -> Result<(ScanHandle, OrchestratorThread)> {
        let (orchestrator, handle) = Self::new(config, parts);
        let thread = thread::Builder::new()
            .name("scan-orchestrator".to_string())
            .spawn(move || orchestrator.run())
            .map_err(|e| Error::Other(format!("Failed to spawn scan orchestrator: {}", e)))?;
        Ok((handle, OrchestratorThread { handle: thread }))
    }

    /// Command loop. Returns on SHUTDOWN or when every handle is dropped.
    pub fn run(mut self) {
        log::info!(
            "Scan orchestrator started ({} workers, queue capacity {})",
            self.pool.size(),
            self.queue.capacity()
        );

        let commands = self.commands.clone();
        let steps = self.steps.clone();
        let results = self.results.clone();

        let mut running = true;
        while running {
            select! {
                recv(commands) -> request => {
                    running = match request {
                        Ok(request) => self.handle_request(request),
                        Err(_) => {
                            log::info!("All scan handles dropped");
                            self.shutdown();
                            false
                        }
                    };
                }
                recv(steps) -> step => {
                    if let Ok(step) = step {
                        self.handle_step(step);
                    }
                }
                recv(results) -> result => {
                    if let Ok(result) = result {
                        self.handle_result(result);
                    }
                }
            }
        }

        log::info!("Scan orchestrator stopped");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Returns false when the loop must end
    fn handle_request(&mut self, request: Request) -> bool {
        log::debug!("Command: {:?}", request.command);
        let mut keep_running = true;

        let reply = match request.command {
            ScanCommand::Start => {
                self.start_scan();
                CommandReply::Ack
            }
            ScanCommand::Stop => {
                self.stop_scan();
                CommandReply::Ack
            }
            ScanCommand::SettingsModeOn => {
                self.set_settings_mode(true);
                CommandReply::Ack
            }
            ScanCommand::SettingsModeOff => {
                self.set_settings_mode(false);
                CommandReply::Ack
            }
            ScanCommand::NotifyHardwareState => {
                self.notify_hardware_state();
                CommandReply::Ack
            }
            ScanCommand::UpdateSettings(payload) => {
                if let Err(e) = self.settings.update(&payload) {
                    log::debug!("Settings update ignored: {}", e);
                }
                CommandReply::Ack
            }
            ScanCommand::GetHardwareInfo => {
                let version = self
                    .hardware
                    .firmware_version()
                    .map_err(|e| log::warn!("Firmware version unavailable: {}", e))
                    .ok();
                CommandReply::HardwareInfo(version)
            }
            ScanCommand::GetCalibrationStream => {
                CommandReply::StreamFrame(self.preview(|p, f| p.calibration_stream_frame(f)))
            }
            ScanCommand::GetLaserStream => {
                CommandReply::StreamFrame(self.preview(|p, f| p.laser_stream_frame(f)))
            }
            ScanCommand::GetTextureStream => {
                CommandReply::StreamFrame(self.preview(|p, f| p.texture_stream_frame(f)))
            }
            ScanCommand::StartCalibration => {
                match self.calibration.start() {
                    Ok(()) => self.calibrating = true,
                    Err(e) => log::warn!("Calibration start failed: {}", e),
                }
                CommandReply::Ack
            }
            ScanCommand::StopCalibration => {
                if let Err(e) = self.calibration.stop() {
                    log::warn!("Calibration stop failed: {}", e);
                }
                self.calibrating = false;
                CommandReply::Ack
            }
            ScanCommand::NotifyIfNotCalibrated => {
                if !self.calibration.is_calibrated() {
                    self.events
                        .notify(Notice::warn(NoticeCode::ScannerNotCalibrated));
                }
                CommandReply::Ack
            }
            ScanCommand::Status => CommandReply::Status(self.status()),
            ScanCommand::Shutdown => {
                self.shutdown();
                keep_running = false;
                CommandReply::Ack
            }
        };

        if let Some(tx) = request.reply {
            // Requester may have timed out already
            tx.send(reply).ok();
        }
        keep_running
    }

    fn start_scan(&mut self) {
        if self.session.is_some() {
            log::warn!("START ignored: scan already running");
            self.events.notify(Notice::warn(NoticeCode::ScanAlreadyRunning));
            return;
        }
        if self.settings_mode {
            self.set_settings_mode(false);
        }

        let settings = self.settings.snapshot();
        self.next_seq += 1;
        let session = match ScanSession::new(self.ids.next_id(), self.next_seq, settings) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("START rejected: {}", e);
                self.events
                    .notify(Notice::warn(NoticeCode::InvalidScanSettings));
                return;
            }
        };

        let geometry = session.geometry;
        log::info!(
            "Starting scan {}: {} frames/rotation, {} laser(s), color={}, {} slots",
            session.scan_id,
            geometry.frames_per_rotation(),
            geometry.laser_positions,
            geometry.color,
            geometry.expected_total()
        );

        self.accumulator
            .open(&session.scan_id, geometry.expected_total());
        if let Err(e) = self.hardware.enable_motors() {
            log::warn!("Failed to enable turntable motors: {}", e);
        }

        let (phase, first_step) = if geometry.color {
            (ScanPhase::Texture, StepKind::Texture)
        } else {
            (ScanPhase::Object, StepKind::Object)
        };
        self.phase = phase;
        let seq = session.seq;
        self.session = Some(session);
        self.post_step(seq, first_step);
    }

    /// Cancel the running scan (if any) and return the hardware to rest
    fn stop_scan(&mut self) {
        let scan_id = match self.session.as_mut() {
            Some(session) => {
                session.cancel_requested = true;
                Some(session.scan_id.clone())
            }
            None => None,
        };

        self.pool.kill();
        let dropped = self.queue.clear();
        if dropped > 0 {
            log::debug!("Discarded {} queued tasks", dropped);
        }

        if let Some(scan_id) = scan_id.as_deref() {
            log::info!("Scan {} canceled", scan_id);
            if let Err(e) = self.storage.delete_scan(scan_id) {
                log::warn!("Failed to delete scan folder {}: {}", scan_id, e);
            }
        }

        self.reset_state();
        self.stop_stream();
        self.events.notify(Notice::info(NoticeCode::ScanCanceled));
    }

    fn shutdown(&mut self) {
        if self.session.is_some() {
            self.stop_scan();
        }
        if self.settings_mode {
            self.set_settings_mode(false);
        }
        if self.calibrating {
            if let Err(e) = self.calibration.stop() {
                log::warn!("Calibration stop failed: {}", e);
            }
            self.calibrating = false;
        }
        self.pool.kill();
    }

    fn set_settings_mode(&mut self, on: bool) {
        if on && self.session.is_some() {
            log::warn!("Settings mode unavailable while scanning");
            return;
        }
        let result = if on {
            self.hardware.settings_mode_on()
        } else {
            self.hardware.settings_mode_off()
        };
        match result {
            Ok(()) => self.settings_mode = on,
            Err(e) => log::warn!("Settings mode switch failed: {}", e),
        }
    }

    fn notify_hardware_state(&self) {
        if !self.hardware.board_connected() {
            self.events
                .notify(Notice::error(NoticeCode::NoSerialConnection));
        }
        if !self.hardware.camera_connected() {
            self.events
                .notify(Notice::error(NoticeCode::NoCameraConnection));
        }
    }

    /// Grab one frame for a preview stream; any failure drops the frame
    fn preview<F>(&mut self, transform: F) -> Option<Frame>
    where
        F: FnOnce(&dyn ImageProcessor, Frame) -> Result<Frame>,
    {
        let result = self
            .hardware
            .get_picture()
            .and_then(|frame| transform(self.processor.as_ref(), frame));
        match result {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::debug!("Preview frame dropped: {}", e);
                None
            }
        }
    }

    fn status(&self) -> ScanStatus {
        let (progress, total) = self.accumulator.progress();
        ScanStatus {
            phase: self.phase,
            scan_id: self.session.as_ref().map(|s| s.scan_id.clone()),
            progress,
            total,
            position: self.session.as_ref().map_or(0, |s| s.current_position),
            settings_mode: self.settings_mode,
            calibrating: self.calibrating,
        }
    }

    // ========================================================================
    // Scan steps
    // ========================================================================

    fn post_step(&self, seq: u64, kind: StepKind) {
        // The orchestrator holds the receiver, so this cannot fail
        self.steps_tx.send(Step { seq, kind }).ok();
    }

    fn handle_step(&mut self, step: Step) {
        let Some(session) = self.session.as_ref() else {
            log::trace!("Step {:?} after teardown ignored", step.kind);
            return;
        };
        if session.seq != step.seq || session.cancel_requested {
            log::trace!("Stale step {:?} ignored", step.kind);
            return;
        }

        let outcome = match step.kind {
            StepKind::Texture => self.texture_step(),
            StepKind::Object => self.object_step(),
        };
        if let Err(e) = outcome {
            log::error!("Scan aborted: {}", e);
            self.stop_scan();
        }
    }

    fn texture_step(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let (seq, position) = (session.seq, session.current_position);
        let n = session.geometry.frames_per_rotation();

        if position == 0 {
            self.begin_texture()?;
        }

        if position <= n {
            self.acquire(position, TaskKind::ProcessColorImage, 0)?;
            self.advance();
            self.post_step(seq, StepKind::Texture);
            return Ok(());
        }

        self.drain_queue();
        self.end_texture();
        if let Some(session) = self.session.as_mut() {
            session.current_position = 0;
        }
        self.phase = ScanPhase::Object;
        self.post_step(seq, StepKind::Object);
        Ok(())
    }

    fn object_step(&mut self) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let (seq, position) = (session.seq, session.current_position);
        let n = session.geometry.frames_per_rotation();
        let lasers = session.geometry.laser_positions;

        if position == 0 {
            self.begin_object()?;
        }

        if position <= n {
            for index in 0..lasers {
                let index = index as u8;
                if let Err(e) = self.hardware.laser_on(index) {
                    log::warn!("Laser {} failed to switch on: {}", index, e);
                }
                self.acquire(position, TaskKind::ProcessLaserImage, index)?;
            }
            self.advance();
            self.post_step(seq, StepKind::Object);
            return Ok(());
        }

        self.stop_stream();
        if let Err(e) = self.hardware.laser_off() {
            log::warn!("Laser off failed: {}", e);
        }
        self.pool.close();
        log::debug!("Laser pass done, waiting for workers");

        let pending = self.session.as_ref().is_some_and(|s| s.completion_pending);
        if pending {
            self.finalize();
        }
        Ok(())
    }

    fn begin_texture(&mut self) -> Result<()> {
        let scan_id = self.scan_id();
        self.events
            .notify(Notice::info(NoticeCode::ScanningTexture).with_scan_id(&scan_id));
        self.pool.create()?;

        let camera = self
            .session
            .as_ref()
            .map_or_else(|| self.settings.snapshot().camera, |s| s.settings.camera);
        self.saved_camera = Some(camera);
        self.apply_camera(CameraSettings::TEXTURE);

        let level = self.config.texture_illumination;
        if let Err(e) = self.hardware.led_on(Rgb::gray(level)) {
            log::warn!("LED on failed: {}", e);
        }
        self.flush_stream();
        self.start_stream(StreamMode::Flash);
        Ok(())
    }

    fn end_texture(&mut self) {
        self.stop_stream();
        self.flush_stream();
        if let Err(e) = self.hardware.led_off() {
            log::warn!("LED off failed: {}", e);
        }
        self.restore_camera();
    }

    fn begin_object(&mut self) -> Result<()> {
        let scan_id = self.scan_id();
        self.events
            .notify(Notice::info(NoticeCode::ScanningObject).with_scan_id(&scan_id));

        let led = self
            .session
            .as_ref()
            .map_or(Rgb::gray(0), |s| s.settings.led);
        if let Err(e) = self.hardware.led_on(led) {
            log::warn!("LED on failed: {}", e);
        }
        self.start_stream(StreamMode::Laser);
        self.flush_stream();
        self.pool.create()
    }

    /// Grab one frame at `position` and queue it.
    ///
    /// A failed grab is logged and counted as a dropped frame.
    fn acquire(&mut self, position: u32, kind: TaskKind, laser_index: u8) -> Result<()> {
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let geometry = session.geometry;
        // Only the first emitter of a position moves the turntable
        let steps = if laser_index == 0 {
            geometry.steps_before(position)
        } else {
            0
        };
        let color = kind == TaskKind::ProcessColorImage;
        let scan_id = session.scan_id.clone();
        let progress_slots = geometry.slots_for(position, kind);

        match self.hardware.scan_at_position(steps, color) {
            // The wrap-around frame repeats position 0 and is never processed
            Ok(_) if progress_slots == 0 => {
                log::debug!(
                    "Frame {} ({:?}) of scan {} not processed",
                    position,
                    kind,
                    scan_id
                );
            }
            Ok(frame) => self.queue.enqueue(ImageTask {
                frame,
                scan_id,
                position,
                frames_per_rotation: geometry.frames_per_rotation(),
                laser_index,
                kind,
                progress_slots,
            })?,
            Err(e) => {
                log::warn!(
                    "Frame {} ({:?}) of scan {} dropped: {}",
                    position,
                    kind,
                    scan_id,
                    e
                );
                if progress_slots > 0 {
                    let dropped = FrameResult {
                        scan_id,
                        position,
                        kind,
                        progress_slots,
                        points: None,
                    };
                    self.results_tx.send(dropped).ok();
                }
            }
        }
        Ok(())
    }

    fn advance(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.current_position += 1;
        }
    }

    // ========================================================================
    // Results and finalization
    // ========================================================================

    fn handle_result(&mut self, result: FrameResult) {
        let outcome = self.accumulator.record(
            &result.scan_id,
            result.points.as_deref(),
            result.progress_slots,
        );

        let (progress, total) = match outcome {
            RecordOutcome::Rejected => {
                log::trace!(
                    "Late result for scan {} position {} discarded",
                    result.scan_id,
                    result.position
                );
                return;
            }
            RecordOutcome::Progress { progress, total }
            | RecordOutcome::Completed { progress, total } => (progress, total),
        };

        self.events.progress(ProgressUpdate {
            scan_id: result.scan_id,
            points: result.points.unwrap_or_default(),
            progress,
            total,
        });

        if let RecordOutcome::Completed { .. } = outcome {
            let laser_pass_running = self.phase == ScanPhase::Object
                && self.session.as_ref().is_some_and(ScanSession::acquiring);
            if laser_pass_running {
                if let Some(session) = self.session.as_mut() {
                    session.completion_pending = true;
                }
            } else {
                self.finalize();
            }
        }
    }

    fn finalize(&mut self) {
        let Some(session) = self.session.clone() else {
            return;
        };
        self.phase = ScanPhase::Finalizing;
        let scan_id = session.scan_id;
        log::info!("Finalizing scan {}", scan_id);

        self.drain_queue();
        let cloud = self.accumulator.take_cloud();

        let saved = self
            .storage
            .save_point_cloud(&scan_id, &cloud)
            .and_then(|_| self.storage.save_settings(&scan_id, &session.settings));

        match &saved {
            Ok(_) => {
                self.events
                    .notify(Notice::info(NoticeCode::SavingPointCloud).with_scan_id(&scan_id));
            }
            Err(e) => log::error!("Failed to save scan {}: {}", scan_id, e),
        }
        if let Err(e) = self.storage.delete_image_folders(&scan_id) {
            log::warn!("Failed to delete image folders of {}: {}", scan_id, e);
        }

        self.reset_state();

        if saved.is_ok() {
            self.events.scan_completed(ScanCompleted {
                scan_id: scan_id.clone(),
                point_count: cloud.len(),
            });
            self.events
                .notify(Notice::success(NoticeCode::ScanComplete).with_scan_id(&scan_id));
        } else {
            self.events
                .notify(Notice::error(NoticeCode::ScanSaveFailed).with_scan_id(&scan_id));
        }
        self.stop_stream();
    }

    /// Back to idle: hardware at rest, session dropped, counters zeroed
    fn reset_state(&mut self) {
        self.flush_stream();
        if let Err(e) = self.hardware.laser_off() {
            log::warn!("Laser off failed: {}", e);
        }
        if let Err(e) = self.hardware.led_off() {
            log::warn!("LED off failed: {}", e);
        }
        if let Err(e) = self.hardware.disable_motors() {
            log::warn!("Disabling motors failed: {}", e);
        }
        self.restore_camera();
        self.pool.close();
        self.accumulator.close();
        self.session = None;
        self.phase = ScanPhase::Idle;
    }

    fn drain_queue(&self) {
        let poll = self.config.drain_poll_interval();
        let pool = &self.pool;
        self.queue.wait_until_empty(poll, || pool.workers_active() > 0);
    }

    // ========================================================================
    // Hardware helpers
    // ========================================================================

    fn scan_id(&self) -> String {
        self.session
            .as_ref()
            .map(|s| s.scan_id.clone())
            .unwrap_or_default()
    }

    fn apply_camera(&mut self, camera: CameraSettings) {
        self.settings.set_camera(camera);
        if let Err(e) = self.hardware.apply_camera_settings(&camera) {
            log::warn!("Camera settings not applied: {}", e);
        }
    }

    fn restore_camera(&mut self) {
        if let Some(camera) = self.saved_camera.take() {
            self.apply_camera(camera);
        }
    }

    fn start_stream(&mut self, mode: StreamMode) {
        if let Err(e) = self.hardware.start_stream(mode) {
            log::warn!("Starting {:?} stream failed: {}", mode, e);
        }
    }

    fn stop_stream(&mut self) {
        if let Err(e) = self.hardware.stop_stream() {
            log::warn!("Stopping stream failed: {}", e);
        }
    }

    fn flush_stream(&mut self) {
        if let Err(e) = self.hardware.flush_stream() {
            log::debug!("Flushing stream failed: {}", e);
        }
    }
}
