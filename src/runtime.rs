//! Thread-pool runtime for evaluating queries off the caller's thread.
//!
//! Queries are pushed through a bounded channel to a fixed set of worker
//! threads. Submission never blocks: a full queue is reported as
//! [`PoolError::QueueFull`]. Each submission returns an [`EvalHandle`] that
//! can wait for the result, wait with a timeout (cancelling the query when
//! the timeout elapses) or cancel directly.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::error::{ConfigError, EvalError, EvalResult, PoolError};
use crate::topdown::{Query, ResultSet};

/// Pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum number of queued queries.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1024,
        }
    }
}

impl PoolConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if a field is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidField {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidField {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

enum Job {
    Eval {
        query: Box<Query>,
        reply: Sender<EvalResult<ResultSet>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(config: PoolConfig) -> Result<Self, PoolError> {
        let (tx, rx) = bounded::<Job>(config.queue_capacity);
        let mut pool = Self {
            tx,
            workers: Vec::with_capacity(config.workers),
            queue_capacity: config.queue_capacity,
        };
        for idx in 0..config.workers {
            let rx: Receiver<Job> = rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("regula-eval-{idx}"))
                .spawn(move || worker_loop(&rx));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(err) => {
                    pool.shutdown();
                    return Err(PoolError::Spawn {
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(pool)
    }

    fn try_submit(&self, job: Job) -> Result<(), PoolError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PoolError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Workers drain queued jobs, then see the closed channel and exit.
        drop(self.tx);
        for handle in self.workers {
            if handle.join().is_err() {
                warn!("evaluation worker panicked");
            }
        }
    }
}

fn worker_loop(rx: &Receiver<Job>) {
    loop {
        match rx.recv() {
            Ok(Job::Eval { query, reply }) => {
                let result = query.run();
                // The submitter may have given up waiting.
                let _ = reply.send(result);
            }
            Err(_) => break,

            #[cfg(test)]
            Ok(Job::Sleep { duration, reply }) => {
                thread::sleep(duration);
                let _ = reply.send(());
            }
        }
    }
}

/// Handle to a submitted query.
pub struct EvalHandle {
    query_id: Uuid,
    cancel: CancelSignal,
    rx: Receiver<EvalResult<ResultSet>>,
}

impl EvalHandle {
    #[must_use]
    pub const fn query_id(&self) -> Uuid {
        self.query_id
    }

    /// Requests cancellation; the query stops at its next cancel check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the query to finish.
    ///
    /// # Errors
    /// The query's own error, or [`PoolError::Disconnected`] if the worker
    /// went away.
    pub fn join(self) -> Result<ResultSet, PoolError> {
        let result = self.rx.recv().map_err(|_| PoolError::Disconnected)?;
        Ok(result?)
    }

    /// Waits at most `timeout`. On timeout the query is cancelled.
    ///
    /// # Errors
    /// [`PoolError::Timeout`] when the deadline passes, otherwise as
    /// [`EvalHandle::join`].
    pub fn join_timeout(self, timeout: Duration) -> Result<ResultSet, PoolError> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel.cancel();
                debug!(query_id = %self.query_id, "evaluation timed out, cancelling");
                Err(PoolError::Timeout {
                    duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Disconnected),
        }
    }
}

/// Fixed-size pool of evaluation threads.
pub struct EvalPool {
    pool: WorkerPool,
}

impl EvalPool {
    /// Starts the worker threads.
    ///
    /// # Errors
    /// Returns an error for an invalid configuration or when a thread cannot
    /// be spawned.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(EvalError::from)?;
        let pool = WorkerPool::start(config)?;
        debug!(workers = config.workers, queue_capacity = config.queue_capacity, "evaluation pool started");
        Ok(Self { pool })
    }

    /// Queues `query` for evaluation.
    ///
    /// # Errors
    /// [`PoolError::QueueFull`] when the queue is at capacity.
    pub fn submit(&self, query: Query) -> Result<EvalHandle, PoolError> {
        let (tx, rx) = bounded::<EvalResult<ResultSet>>(1);
        let handle = EvalHandle {
            query_id: query.id(),
            cancel: query.cancel_signal(),
            rx,
        };
        self.pool.try_submit(Job::Eval {
            query: Box::new(query),
            reply: tx,
        })?;
        Ok(handle)
    }

    /// Submits `query` and waits for it.
    ///
    /// # Errors
    /// See [`EvalPool::submit`] and [`EvalHandle::join`].
    pub fn evaluate(&self, query: Query) -> Result<ResultSet, PoolError> {
        self.submit(query)?.join()
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> Result<Receiver<()>, PoolError> {
        let (tx, rx) = bounded::<()>(1);
        self.pool.try_submit(Job::Sleep { duration, reply: tx })?;
        Ok(rx)
    }
}

impl Drop for EvalPool {
    fn drop(&mut self) {
        let pool = std::mem::replace(
            &mut self.pool,
            WorkerPool {
                tx: bounded::<Job>(1).0,
                workers: Vec::new(),
                queue_capacity: 1,
            },
        );
        pool.shutdown();
    }
}
