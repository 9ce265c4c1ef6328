//! Image processing worker pool.
//!
//! A pool runs in generations. `create` spawns a generation of
//! `process_numbers` named threads that share the task queue receiver; each
//! worker takes one task at a time, runs the image processor and posts a
//! [`FrameResult`] to the orchestrator. Every generation has its own flags, so
//! stopping one never affects the next.
//!
//! ```text
//! create ──► running ──close──► draining ──(queue empty)──► exited
//!               │
//!               └──kill──► exited (no join, in-flight results go stale)
//! ```

use crate::core::services::ImageProcessor;
use crate::core::types::{FrameResult, ImageTask, TaskKind};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long a worker waits for a task before re-checking its flags
const WORKER_POLL: Duration = Duration::from_millis(20);

/// Control flags of one worker generation
struct Generation {
    id: u64,
    stop: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    alive: Arc<AtomicUsize>,
}

impl Generation {
    fn is_running(&self) -> bool {
        self.alive.load(Ordering::Acquire) > 0
            && !self.stop.load(Ordering::Acquire)
            && !self.draining.load(Ordering::Acquire)
    }
}

/// Fixed-size pool of processing threads
pub struct WorkerPool {
    size: usize,
    processor: Arc<dyn ImageProcessor>,
    tasks: Receiver<ImageTask>,
    results: Sender<FrameResult>,
    current: Option<Generation>,
    next_id: AtomicU64,
}

impl WorkerPool {
    pub fn new(
        size: usize,
        processor: Arc<dyn ImageProcessor>,
        tasks: Receiver<ImageTask>,
        results: Sender<FrameResult>,
    ) -> Self {
        Self {
            size: size.max(1),
            processor,
            tasks,
            results,
            current: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether a generation is running and accepting work
    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(Generation::is_running)
    }

    /// Workers of the current generation that have not exited yet
    pub fn workers_active(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |g| g.alive.load(Ordering::Acquire))
    }

    /// Start a new generation. No-op while one is running.
    pub fn create(&mut self) -> Result<()> {
        if self.is_active() {
            log::debug!("Worker pool already running");
            return Ok(());
        }

        let generation = Generation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            stop: Arc::new(AtomicBool::new(false)),
            draining: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicUsize::new(0)),
        };

        for index in 0..self.size {
            let worker = Worker {
                processor: Arc::clone(&self.processor),
                tasks: self.tasks.clone(),
                results: self.results.clone(),
                stop: Arc::clone(&generation.stop),
                draining: Arc::clone(&generation.draining),
                alive: Arc::clone(&generation.alive),
            };
            generation.alive.fetch_add(1, Ordering::AcqRel);
            let spawned = thread::Builder::new()
                .name(format!("scan-worker-{}-{}", generation.id, index))
                .spawn(move || worker.run());
            if let Err(e) = spawned {
                generation.alive.fetch_sub(1, Ordering::AcqRel);
                generation.stop.store(true, Ordering::Release);
                return Err(Error::Other(format!("Failed to spawn scan worker: {}", e)));
            }
        }

        log::info!(
            "Worker pool generation {} started ({} workers)",
            generation.id,
            self.size
        );
        self.current = Some(generation);
        Ok(())
    }

    /// Let the current generation finish the queued tasks, then exit
    pub fn close(&mut self) {
        if let Some(generation) = self.current.as_ref() {
            log::debug!("Worker pool generation {} draining", generation.id);
            generation.draining.store(true, Ordering::Release);
        }
    }

    /// Stop the current generation immediately without waiting for it
    pub fn kill(&mut self) {
        if let Some(generation) = self.current.take() {
            log::debug!("Worker pool generation {} killed", generation.id);
            generation.stop.store(true, Ordering::Release);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.kill();
    }
}

struct Worker {
    processor: Arc<dyn ImageProcessor>,
    tasks: Receiver<ImageTask>,
    results: Sender<FrameResult>,
    stop: Arc<AtomicBool>,
    draining: Arc<AtomicBool>,
    alive: Arc<AtomicUsize>,
}

impl Worker {
    fn run(self) {
        log::trace!("{} started", thread_name());
        loop {
            if self.stop.load(Ordering::Acquire) {
                break;
            }
            match self.tasks.recv_timeout(WORKER_POLL) {
                Ok(task) => {
                    let result = process_task(self.processor.as_ref(), task);
                    if self.results.send(result).is_err() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.draining.load(Ordering::Acquire) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.alive.fetch_sub(1, Ordering::AcqRel);
        log::trace!("{} exited", thread_name());
    }
}

fn thread_name() -> String {
    thread::current().name().unwrap_or("scan-worker").to_string()
}

/// Run the processor on one task.
///
/// A failed frame still completes, without geometry, so it consumes its
/// progress slot.
pub fn process_task(processor: &dyn ImageProcessor, task: ImageTask) -> FrameResult {
    match processor.process(&task) {
        Ok(processed) => match task.kind {
            TaskKind::ProcessColorImage => FrameResult::empty(&task),
            TaskKind::ProcessLaserImage => FrameResult {
                points: Some(processed.points),
                ..FrameResult::empty(&task)
            },
        },
        Err(e) => {
            log::warn!(
                "Dropping frame {} ({:?}) of scan {}: {}",
                task.position,
                task.kind,
                task.scan_id,
                e
            );
            FrameResult::empty(&task)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Frame, PointRecord, ProcessedFrame};
    use crate::scan::queue::TaskQueue;
    use std::time::Instant;

    /// Emits one point per laser frame, fails on odd positions when asked
    struct StubProcessor {
        fail_odd: bool,
        delay: Duration,
    }

    impl ImageProcessor for StubProcessor {
        fn process(&self, task: &ImageTask) -> Result<ProcessedFrame> {
            thread::sleep(self.delay);
            if self.fail_odd && task.position % 2 == 1 {
                return Err(Error::Processing("odd".to_string()));
            }
            let point = PointRecord {
                x: task.position as f32,
                y: 0.0,
                z: 0.0,
                r: 0,
                g: 0,
                b: 0,
            };
            Ok(ProcessedFrame {
                points: vec![point],
            })
        }

        fn texture_stream_frame(&self, frame: Frame) -> Result<Frame> {
            Ok(frame)
        }

        fn laser_stream_frame(&self, frame: Frame) -> Result<Frame> {
            Ok(frame)
        }

        fn calibration_stream_frame(&self, frame: Frame) -> Result<Frame> {
            Ok(frame)
        }
    }

    fn task(position: u32, kind: TaskKind) -> ImageTask {
        ImageTask {
            frame: Frame::new(1, 1, vec![0, 0, 0]),
            scan_id: "20240101-120000".to_string(),
            position,
            frames_per_rotation: 16,
            laser_index: 0,
            kind,
            progress_slots: 1,
        }
    }

    fn pool(
        size: usize,
        processor: StubProcessor,
    ) -> (WorkerPool, TaskQueue, Receiver<FrameResult>) {
        let queue = TaskQueue::new(size + 1);
        let (tx, rx) = crossbeam_channel::unbounded();
        let pool = WorkerPool::new(size, Arc::new(processor), queue.receiver(), tx);
        (pool, queue, rx)
    }

    fn wait_for_exit(pool: &WorkerPool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.workers_active() > 0 {
            assert!(Instant::now() < deadline, "workers did not exit");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_every_task_yields_one_result() {
        let (mut pool, queue, results) = pool(
            3,
            StubProcessor {
                fail_odd: true,
                delay: Duration::ZERO,
            },
        );
        pool.create().unwrap();
        assert_eq!(pool.workers_active(), 3);

        for i in 0..10 {
            queue.enqueue(task(i, TaskKind::ProcessLaserImage)).unwrap();
        }

        let mut got: Vec<FrameResult> = (0..10)
            .map(|_| results.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        got.sort_by_key(|r| r.position);

        for r in &got {
            if r.position % 2 == 1 {
                assert!(r.points.is_none(), "failed frame must carry no geometry");
            } else {
                assert_eq!(r.points.as_ref().map(Vec::len), Some(1));
            }
            assert_eq!(r.progress_slots, 1);
        }
        pool.kill();
    }

    #[test]
    fn test_texture_results_carry_no_geometry() {
        let processor = StubProcessor {
            fail_odd: false,
            delay: Duration::ZERO,
        };
        let result = process_task(&processor, task(2, TaskKind::ProcessColorImage));
        assert!(result.points.is_none());
        assert_eq!(result.kind, TaskKind::ProcessColorImage);
    }

    #[test]
    fn test_create_is_idempotent() {
        let (mut pool, _queue, _results) = pool(
            2,
            StubProcessor {
                fail_odd: false,
                delay: Duration::ZERO,
            },
        );
        pool.create().unwrap();
        pool.create().unwrap();
        assert_eq!(pool.workers_active(), 2);
        pool.kill();
        assert!(!pool.is_active());
    }

    #[test]
    fn test_close_drains_queue_then_exits() {
        let (mut pool, queue, results) = pool(
            1,
            StubProcessor {
                fail_odd: false,
                delay: Duration::from_millis(10),
            },
        );
        pool.create().unwrap();
        queue.enqueue(task(0, TaskKind::ProcessLaserImage)).unwrap();
        queue.enqueue(task(1, TaskKind::ProcessLaserImage)).unwrap();
        pool.close();
        assert!(!pool.is_active());

        wait_for_exit(&pool);
        assert!(queue.is_empty());
        assert_eq!(results.try_iter().count(), 2);
    }

    #[test]
    fn test_kill_then_create_new_generation() {
        let (mut pool, queue, results) = pool(
            2,
            StubProcessor {
                fail_odd: false,
                delay: Duration::ZERO,
            },
        );
        pool.create().unwrap();
        pool.kill();
        assert_eq!(pool.workers_active(), 0);

        pool.create().unwrap();
        assert!(pool.is_active());
        queue.enqueue(task(5, TaskKind::ProcessLaserImage)).unwrap();
        let r = results.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(r.position, 5);
        pool.kill();
    }
}
