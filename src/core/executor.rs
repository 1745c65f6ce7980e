//! Single-threaded delivery executor
//!
//! Any thread may post tasks through a [`Spawner`]; they run one at a time,
//! in posting order, on whichever thread drives the [`LocalExecutor`]. Each
//! task receives mutable access to a context that only the driving thread
//! owns, so the context itself never has to be `Send`.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A unit of work run on the executor's thread
pub type Task<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// Cloneable, thread-safe handle for posting tasks
pub struct Spawner<C> {
    tx: Sender<Task<C>>,
}

impl<C> Clone for Spawner<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<C> Spawner<C> {
    /// Post a task. Returns false if the executor is gone.
    pub fn post<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut C) + Send + 'static,
    {
        self.tx.send(Box::new(task)).is_ok()
    }
}

/// Receiving end; run by exactly one thread
pub struct LocalExecutor<C> {
    rx: Receiver<Task<C>>,
    tx: Sender<Task<C>>,
}

impl<C> Default for LocalExecutor<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> LocalExecutor<C> {
    /// Create an executor with an unbounded queue
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { rx, tx }
    }

    /// New handle for posting tasks
    pub fn spawner(&self) -> Spawner<C> {
        Spawner {
            tx: self.tx.clone(),
        }
    }

    /// Number of queued tasks
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Run the tasks queued at the time of the call.
    ///
    /// Tasks posted while these run wait for the next call.
    pub fn run_pending(&self, ctx: &mut C) -> usize {
        let queued = self.rx.len();
        let mut ran = 0;
        for _ in 0..queued {
            match self.rx.try_recv() {
                Ok(task) => {
                    task(ctx);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Wait up to `timeout` for work, then run everything queued.
    pub fn run_timeout(&self, ctx: &mut C, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(task) => {
                task(ctx);
                1 + self.run_pending(ctx)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }
}
