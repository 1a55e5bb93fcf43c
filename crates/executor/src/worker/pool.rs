//! Worker pool for batch execution
//!
//! Launches one task per batch and waits for every one of them. Workers share
//! nothing but the failure recorder; a worker that dies before returning its
//! result is reported as a [`WorkerFailure`], never counted as zero.

use std::any::Any;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, Instrument};

use super::engine::{CommandOutcome, RetryEngine};
use crate::partition::Batch;
use crate::recorder::FailureRecorder;
use crate::reliability::RetryPolicy;
use crate::runner::CommandRunner;

/// Counts a worker reports once its batch is done
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    pub worker_id: usize,
    pub batch_len: usize,
    pub success_count: usize,
    pub failure_count: usize,
    /// Commands left without a terminal state because of shutdown
    pub cancelled_count: usize,
}

impl WorkerResult {
    /// Commands that reached success or exhaustion
    pub fn terminal_count(&self) -> usize {
        self.success_count + self.failure_count
    }
}

/// A worker that terminated without producing a [`WorkerResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFailure {
    pub worker_id: usize,
    /// Commands in the lost batch, none of which are counted
    pub batch_len: usize,
    pub reason: String,
}

/// Everything gathered at the join barrier
#[derive(Debug, Clone, Default)]
pub struct PoolOutcome {
    /// Results ordered by worker id
    pub results: Vec<WorkerResult>,
    pub failures: Vec<WorkerFailure>,
}

/// Fixed-size pool: one worker per batch, no resizing, no work stealing
///
/// # Example
///
/// ```ignore
/// use fanout_executor::worker::WorkerPool;
///
/// let pool = WorkerPool::new(Arc::new(ProcessRunner::default()), RetryPolicy::default());
/// let outcome = pool.run(batches, recorder).await;
/// ```
pub struct WorkerPool {
    runner: Arc<dyn CommandRunner>,
    policy: RetryPolicy,
    shutdown_rx: watch::Receiver<bool>,
}

impl WorkerPool {
    /// Create a pool that never observes a shutdown signal
    pub fn new(runner: Arc<dyn CommandRunner>, policy: RetryPolicy) -> Self {
        let (_tx, shutdown_rx) = watch::channel(false);
        Self {
            runner,
            policy,
            shutdown_rx,
        }
    }

    /// Observe `rx`; workers stop at the next safe point once it turns `true`
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = rx;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run every batch to completion and join all workers
    ///
    /// Consumes `recorder` so the collector can finish once workers are done.
    #[instrument(skip_all, fields(workers = batches.len()))]
    pub async fn run(&self, batches: Vec<Batch>, recorder: FailureRecorder) -> PoolOutcome {
        info!(
            workers = batches.len(),
            max_attempts = self.policy.max_attempts,
            "Starting worker pool"
        );

        let handles: Vec<(usize, usize, JoinHandle<WorkerResult>)> = batches
            .into_iter()
            .map(|batch| {
                let worker_id = batch.worker_id;
                let batch_len = batch.len();
                let engine = RetryEngine::new(
                    worker_id,
                    Arc::clone(&self.runner),
                    self.policy.clone(),
                    recorder.clone(),
                    self.shutdown_rx.clone(),
                );
                let span = tracing::info_span!("worker", worker_id, batch_len);
                let handle = tokio::spawn(run_worker(batch, engine).instrument(span));
                (worker_id, batch_len, handle)
            })
            .collect();
        drop(recorder);

        let mut outcome = PoolOutcome::default();
        for (worker_id, batch_len, handle) in handles {
            match handle.await {
                Ok(result) => outcome.results.push(result),
                Err(e) => {
                    let reason = if e.is_panic() {
                        format!("worker panicked: {}", panic_message(e.into_panic()))
                    } else {
                        "worker task was cancelled".to_string()
                    };
                    error!(worker_id, batch_len, %reason, "Worker produced no result");
                    outcome.failures.push(WorkerFailure {
                        worker_id,
                        batch_len,
                        reason,
                    });
                }
            }
        }

        info!(
            completed = outcome.results.len(),
            failed = outcome.failures.len(),
            "All workers joined"
        );
        outcome
    }
}

/// Execute a batch strictly in input order
async fn run_worker(batch: Batch, mut engine: RetryEngine) -> WorkerResult {
    let mut result = WorkerResult {
        worker_id: batch.worker_id,
        batch_len: batch.len(),
        ..Default::default()
    };

    for command in &batch.commands {
        match engine.execute(command).await {
            CommandOutcome::Succeeded { .. } => result.success_count += 1,
            CommandOutcome::Exhausted { .. } => result.failure_count += 1,
            CommandOutcome::Cancelled { .. } => result.cancelled_count += 1,
        }
    }

    debug!(
        success = result.success_count,
        failed = result.failure_count,
        cancelled = result.cancelled_count,
        "Worker finished batch"
    );
    result
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
