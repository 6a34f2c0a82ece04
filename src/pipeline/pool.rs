// src/pipeline/pool.rs
// =============================================================================
// A bounded worker pool with a caller-runs rejection policy.
//
// Submitting a job goes through these steps, in order:
// 1. Fewer than `core_workers` workers alive: start a worker with the job
// 2. Room in the backlog (`queue_capacity`): queue the job
// 3. Fewer than `max_workers` workers alive: start an extra worker with the
//    job; extra workers exit after `keep_alive` without work
// 4. Otherwise the submitter runs the job itself, right now
//
// Step 4 is the backpressure: a busy pool slows down whoever feeds it, and
// no job is ever dropped.
//
// A job that panics is caught and logged; the worker keeps serving the
// backlog.
// =============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, trace, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;

/// A unit of work for the pool.
pub type Job = BoxFuture<'static, ()>;

/// Where a submitted job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to a freshly started worker.
    Worker,
    /// Waiting in the backlog.
    Queued,
    /// Already executed by the submitter.
    CallerRan,
}

pub struct WorkerPool {
    name: &'static str,
    config: PoolConfig,
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    live: Arc<AtomicUsize>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(name: &'static str, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate(name)?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        Ok(Self {
            name,
            config,
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            live: Arc::new(AtomicUsize::new(0)),
            workers: JoinSet::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of workers currently alive.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Submits a job. Returns only after the job was placed, which under
    /// saturation means after the job has run on the caller.
    pub async fn execute(&mut self, job: Job) -> Dispatch {
        if self.live_workers() < self.config.core_workers {
            self.spawn_worker(job, None);
            return Dispatch::Worker;
        }

        let job = match self.sender.try_send(job) {
            Ok(()) => return Dispatch::Queued,
            Err(TrySendError::Full(job)) | Err(TrySendError::Closed(job)) => job,
        };

        if self.live_workers() < self.config.max_workers {
            self.spawn_worker(job, Some(self.config.keep_alive));
            return Dispatch::Worker;
        }

        debug!(pool = self.name, "Pool saturated, running job on the caller");
        run_job(self.name, job).await;
        Dispatch::CallerRan
    }

    fn spawn_worker(&mut self, first: Job, keep_alive: Option<Duration>) {
        let name = self.name;
        let receiver = Arc::clone(&self.receiver);
        let live = Arc::clone(&self.live);

        let id = live.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(pool = name, worker = id, extra = keep_alive.is_some(), "Starting worker");

        self.workers.spawn(async move {
            run_job(name, first).await;

            loop {
                let next = match keep_alive {
                    Some(idle) => match tokio::time::timeout(idle, next_job(&receiver)).await {
                        Ok(job) => job,
                        Err(_) => {
                            trace!(pool = name, "Idle extra worker exiting");
                            None
                        }
                    },
                    None => next_job(&receiver).await,
                };

                match next {
                    Some(job) => run_job(name, job).await,
                    None => break,
                }
            }

            live.fetch_sub(1, Ordering::SeqCst);
        });
    }

    /// Closes the backlog and waits for the workers to finish what is left.
    /// Workers still busy after `timeout` are aborted.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), PoolError> {
        let Self {
            name,
            sender,
            mut workers,
            ..
        } = self;

        // Workers see the end of the backlog once it is empty
        drop(sender);

        let drained = tokio::time::timeout(timeout, async {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    warn!(pool = name, error = %e, "Worker ended abnormally");
                }
            }
        })
        .await;

        match drained {
            Ok(()) => {
                debug!(pool = name, "Pool drained");
                Ok(())
            }
            Err(_) => {
                let pending = workers.len();
                workers.abort_all();
                Err(PoolError::DrainTimeout {
                    pool: name,
                    after: timeout,
                    pending,
                })
            }
        }
    }
}

async fn next_job(receiver: &Mutex<mpsc::Receiver<Job>>) -> Option<Job> {
    receiver.lock().await.recv().await
}

async fn run_job(pool: &'static str, job: Job) {
    if let Err(panic) = AssertUnwindSafe(job).catch_unwind().await {
        error!(pool, panic = %panic_message(&*panic), "Pool job panicked");
    }
}

pub(super) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
