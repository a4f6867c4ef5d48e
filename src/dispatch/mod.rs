//! Worker pool and task dispatch
//!
//! A fixed set of worker threads pulls deferred tasks from a shared
//! queue. Tasks are fire-and-forget and may themselves submit further
//! tasks through a [`WorkerHandle`], so the tree-walk fan-out pattern
//! works without the submitter ever blocking.
//!
//! Completion is tracked as a counted outstanding-work set: the counter
//! goes up at submit time and down after execution, which gives
//! [`WorkerPool::join`] an exact termination condition even while
//! running tasks are still enqueueing more work. Task failures are
//! recorded in a shared failure log instead of being discarded.

use crate::error::{ParputError, Result};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// A deferred, self-contained unit of work
type Task = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

enum Message {
    Run(Task),
    Terminate,
}

struct Shared {
    pending: Mutex<usize>,
    drained: Condvar,
    shutdown: AtomicBool,
    failures: Mutex<Vec<ParputError>>,
}

impl Shared {
    fn submit(&self, sender: &Sender<Message>, task: Task) {
        *self.pending.lock().unwrap() += 1;

        if sender.send(Message::Run(task)).is_err() {
            // Workers are gone; nothing will ever run this task.
            warn!("task submitted after worker pool shutdown, dropping");
            self.finish(Some(ParputError::WorkerPoolError(
                "task submitted after shutdown".to_string(),
            )));
        }
    }

    fn finish(&self, failure: Option<ParputError>) {
        if let Some(err) = failure {
            self.failures.lock().unwrap().push(err);
        }

        let mut pending = self.pending.lock().unwrap();
        *pending -= 1;
        if *pending == 0 {
            drop(pending);
            self.drained.notify_all();
        }
    }
}

/// Cloneable submission handle, for tasks that enqueue further tasks
#[derive(Clone)]
pub struct WorkerHandle {
    shared: Arc<Shared>,
    sender: Sender<Message>,
}

impl WorkerHandle {
    /// Enqueue a task for eventual, out-of-order execution
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.shared.submit(&self.sender, Box::new(task));
    }
}

/// Fixed-size pool of worker threads executing submitted tasks
pub struct WorkerPool {
    shared: Arc<Shared>,
    sender: Sender<Message>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` worker threads
    pub fn new(count: usize) -> Self {
        let count = count.max(1);
        let (sender, receiver) = unbounded();
        let shared = Arc::new(Shared {
            pending: Mutex::new(0),
            drained: Condvar::new(),
            shutdown: AtomicBool::new(false),
            failures: Mutex::new(Vec::new()),
        });

        let workers = (0..count)
            .map(|i| {
                let receiver: Receiver<Message> = receiver.clone();
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("parput-worker-{i}"))
                    .spawn(move || worker_loop(&receiver, &shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            shared,
            sender,
            workers,
        }
    }

    /// Enqueue a task; returns immediately
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.shared.submit(&self.sender, Box::new(task));
    }

    /// Handle for submitting from inside tasks
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
        }
    }

    /// Block until every submitted task has finished, including tasks
    /// submitted by tasks that were still running when `join` was called
    pub fn join(&self) {
        let mut pending = self.shared.pending.lock().unwrap();
        while *pending > 0 {
            pending = self.shared.drained.wait(pending).unwrap();
        }
    }

    /// Request shutdown: queued tasks are discarded, in-flight tasks run
    /// to completion. `join` still terminates afterwards.
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
    }

    /// Drain the failures recorded by tasks so far
    pub fn take_failures(&self) -> Vec<ParputError> {
        std::mem::take(&mut self.shared.failures.lock().unwrap())
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Terminate);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(receiver: &Receiver<Message>, shared: &Shared) {
    while let Ok(message) = receiver.recv() {
        let task = match message {
            Message::Run(task) => task,
            Message::Terminate => break,
        };

        if shared.shutdown.load(Ordering::SeqCst) {
            shared.finish(None);
            continue;
        }

        match catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(())) => shared.finish(None),
            Ok(Err(err)) => {
                warn!(error = %err, "task failed");
                shared.finish(Some(err));
            }
            Err(_) => {
                warn!("task panicked");
                shared.finish(Some(ParputError::WorkerPoolError(
                    "task panicked".to_string(),
                )));
            }
        }
    }
    debug!("worker exiting");
}
