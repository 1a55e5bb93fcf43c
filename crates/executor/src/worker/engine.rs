//! Retry engine
//!
//! Drives one command through its attempts, sequentially, inside the worker
//! that owns it:
//!
//! ```text
//! Pending ─▶ Executing ─┬─▶ Succeeded                (exit 0)
//!               ▲       ├─▶ RetryWait ─┐             (exit ≠ 0, attempts left)
//!               └───────┼──────────────┘
//!                       └─▶ Exhausted                (exit ≠ 0, none left)
//! ```
//!
//! Every failed attempt appends one record; a success appends none. A
//! shutdown signal moves the command to `Cancelled` without recording the
//! interrupted attempt.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::command::CommandUnit;
use crate::recorder::{AttemptRecord, FailureRecorder};
use crate::reliability::RetryPolicy;
use crate::runner::CommandRunner;

/// Terminal state of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit code 0 on attempt `attempts`
    Succeeded { attempts: u32 },
    /// Every attempt failed; `exit_code` is the last one seen
    Exhausted { attempts: u32, exit_code: i32 },
    /// Shutdown requested before the command reached a terminal state
    Cancelled { attempts: u32 },
}

#[derive(Debug, Clone, Copy)]
enum AttemptState {
    Executing { attempt: u32 },
    RetryWait { next_attempt: u32 },
    Done(CommandOutcome),
}

/// Per-worker attempt loop
pub struct RetryEngine {
    worker_id: usize,
    runner: Arc<dyn CommandRunner>,
    policy: RetryPolicy,
    recorder: FailureRecorder,
    shutdown: watch::Receiver<bool>,
}

impl RetryEngine {
    pub fn new(
        worker_id: usize,
        runner: Arc<dyn CommandRunner>,
        policy: RetryPolicy,
        recorder: FailureRecorder,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id,
            runner,
            policy,
            recorder,
            shutdown,
        }
    }

    /// Run `command` until it succeeds, exhausts its attempts, or is cancelled
    pub async fn execute(&mut self, command: &CommandUnit) -> CommandOutcome {
        let mut state = AttemptState::Executing { attempt: 1 };

        loop {
            state = match state {
                AttemptState::Executing { attempt } => self.attempt(command, attempt).await,
                AttemptState::RetryWait { next_attempt } => {
                    let delay = self.policy.delay_for_attempt(next_attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => AttemptState::Executing { attempt: next_attempt },
                        _ = shutdown_requested(&mut self.shutdown) => {
                            AttemptState::Done(CommandOutcome::Cancelled { attempts: next_attempt - 1 })
                        }
                    }
                }
                AttemptState::Done(outcome) => return outcome,
            };
        }
    }

    async fn attempt(&mut self, command: &CommandUnit, attempt: u32) -> AttemptState {
        if *self.shutdown.borrow() {
            return AttemptState::Done(CommandOutcome::Cancelled {
                attempts: attempt - 1,
            });
        }

        let exit_code = tokio::select! {
            code = self.runner.run(command) => code,
            _ = shutdown_requested(&mut self.shutdown) => {
                debug!(command = %command, attempt, "Attempt interrupted by shutdown");
                return AttemptState::Done(CommandOutcome::Cancelled { attempts: attempt - 1 });
            }
        };

        if exit_code == 0 {
            debug!(command = %command, attempt, "Command succeeded");
            return AttemptState::Done(CommandOutcome::Succeeded { attempts: attempt });
        }

        let final_attempt = !self.policy.has_attempts_remaining(attempt);
        self.record(command, attempt, exit_code, final_attempt);

        if final_attempt {
            warn!(
                worker_id = self.worker_id,
                command = %command,
                attempts = attempt,
                exit_code,
                "Command exhausted retries"
            );
            AttemptState::Done(CommandOutcome::Exhausted {
                attempts: attempt,
                exit_code,
            })
        } else {
            debug!(
                command = %command,
                attempt,
                exit_code,
                max_attempts = self.policy.max_attempts,
                "Attempt failed, retrying"
            );
            AttemptState::RetryWait {
                next_attempt: attempt + 1,
            }
        }
    }

    fn record(&self, command: &CommandUnit, attempt: u32, exit_code: i32, final_attempt: bool) {
        let record = AttemptRecord {
            timestamp: Utc::now(),
            command: command.text.clone(),
            command_index: command.index,
            worker_id: self.worker_id,
            attempt,
            exit_code,
            final_attempt,
        };
        if let Err(e) = self.recorder.append(record) {
            error!(command = %command, attempt, error = %e, "Failed to record attempt");
        }
    }
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let signalled = rx.wait_for(|stop| *stop).await.is_ok();
    if !signalled {
        std::future::pending::<()>().await;
    }
}
