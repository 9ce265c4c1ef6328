//! Bounded task queue between the orchestrator and the workers.
//!
//! Capacity is small (workers + 1) so the orchestrator cannot run ahead of
//! processing: `enqueue` blocks while the queue is full, which also paces the
//! turntable.

use crate::core::types::ImageTask;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender};
use std::thread;
use std::time::Duration;

/// Bounded FIFO of image tasks
pub struct TaskQueue {
    tx: Sender<ImageTask>,
    rx: Receiver<ImageTask>,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Append a task, blocking while the queue is full
    pub fn enqueue(&self, task: ImageTask) -> Result<()> {
        if self.tx.is_full() {
            log::trace!("Task queue full, waiting for a worker");
        }
        self.tx
            .send(task)
            .map_err(|_| Error::ChannelClosed("task queue"))
    }

    /// Consumer end handed to workers
    pub fn receiver(&self) -> Receiver<ImageTask> {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every queued task, returning how many were discarded
    pub fn clear(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Poll until the queue is empty.
    ///
    /// Gives up early when `consumers_alive` reports nobody left to drain it;
    /// returns whether the queue ended up empty.
    pub fn wait_until_empty<F>(&self, poll: Duration, consumers_alive: F) -> bool
    where
        F: Fn() -> bool,
    {
        while !self.is_empty() {
            if !consumers_alive() {
                log::warn!("{} tasks left in queue with no worker running", self.len());
                return false;
            }
            thread::sleep(poll);
        }
        true
    }
}
