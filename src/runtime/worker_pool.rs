// src/runtime/worker_pool.rs
//! Dedicated worker pool for long, blocking train/predict work
//!
//! Jobs never run on the request-handling runtime. Each worker is a named OS
//! thread that owns a private single-threaded Tokio runtime, used only to
//! drive the network calls its current job makes.
//!
//! # Architecture
//!
//! ```text
//! Request handler ── submit(job) ──► [ crossbeam channel ]
//!                                       │      │      │
//!                                       ▼      ▼      ▼
//!                                   Worker 0 Worker 1 Worker N
//!                                   (runtime)(runtime)(runtime)
//! ```
//!
//! A job that hangs on a remote call stalls only its own worker.

use crate::utils::errors::{LabError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::runtime::Runtime;
use tracing::{debug, error, info};

/// Unit of work executed on a worker thread
pub type Job = Box<dyn FnOnce(&WorkerContext) + Send + 'static>;

/// Per-worker execution context handed to every job
pub struct WorkerContext {
    worker_id: usize,
    runtime: Arc<Runtime>,
}

impl WorkerContext {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The worker's private runtime, for blocking on network calls
    pub fn runtime(&self) -> Arc<Runtime> {
        Arc::clone(&self.runtime)
    }
}

/// Worker pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub queued: usize,
    pub active: usize,
}

/// Fixed-size pool of job threads
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: usize,
    queued: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `workers` threads, each with its own runtime
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(LabError::ConfigError("worker pool needs at least one worker".into()));
        }

        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let queued = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        for worker_id in 0..workers {
            Self::spawn_worker(worker_id, receiver.clone(), Arc::clone(&queued), Arc::clone(&active))?;
        }

        info!("Worker pool started with {} workers", workers);

        Ok(Self {
            sender: Some(sender),
            workers,
            queued,
            active,
        })
    }

    fn spawn_worker(
        worker_id: usize,
        receiver: Receiver<Job>,
        queued: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
    ) -> Result<()> {
        // The runtime is built on the worker thread so it is also dropped
        // there, never inside an async context.
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        thread::Builder::new()
            .name(format!("simlab-worker-{}", worker_id))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => Arc::new(runtime),
                    Err(e) => {
                        let _ = ready_tx.send(Err(LabError::Io(e)));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                let ctx = WorkerContext { worker_id, runtime };

                for job in receiver.iter() {
                    queued.fetch_sub(1, Ordering::SeqCst);
                    active.fetch_add(1, Ordering::SeqCst);
                    debug!("Worker {} picked up a job", worker_id);

                    if catch_unwind(AssertUnwindSafe(|| job(&ctx))).is_err() {
                        error!("Job panicked on worker {}", worker_id);
                    }

                    active.fetch_sub(1, Ordering::SeqCst);
                }

                debug!("Worker {} exiting", worker_id);
            })?;

        ready_rx
            .recv()
            .map_err(|_| LabError::ServerError(format!("worker {} died during startup", worker_id)))?
    }

    /// Queue a job; returns immediately
    pub fn submit(&self, job: Job) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| LabError::ServerError("worker pool is shut down".into()))?;

        self.queued.fetch_add(1, Ordering::SeqCst);
        sender.send(job).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            LabError::ServerError("worker pool is shut down".into())
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.workers,
            queued: self.queued.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
        }
    }

    /// Stop accepting jobs; workers exit once the queue drains
    pub fn shutdown(&mut self) {
        if self.sender.take().is_some() {
            info!("Worker pool shutting down");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
