// Command runners
// Decision: Use trait-based abstraction for attempt execution
// This keeps the retry engine agnostic to how a command is run, and lets
// tests replace real processes with scripted exit codes.

use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::CommandUnit;
use crate::reliability::TimeoutConfig;

/// Base added to the signal number for signal-terminated processes
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// Exit code for a program that could not be spawned
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Exit code for an attempt killed after exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code when the platform reports neither a code nor a signal
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Executes one attempt of a command and reports its exit code
///
/// Zero is success, anything else is a failed attempt.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandUnit) -> i32;
}

/// Map a process exit status onto a single integer code
///
/// Signal termination becomes `128 + signal`.
pub fn normalize_exit_status(status: ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            status
                .signal()
                .map(|s| SIGNAL_EXIT_BASE + s)
                .unwrap_or(UNKNOWN_EXIT_CODE)
        }
        #[cfg(not(unix))]
        {
            UNKNOWN_EXIT_CODE
        }
    })
}

/// Spawns each command as a child process, without a shell
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: TimeoutConfig,
}

impl ProcessRunner {
    pub fn new(timeout: TimeoutConfig) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &CommandUnit) -> i32 {
        let invocation = &command.invocation;
        let mut child = match Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "Failed to spawn command");
                return SPAWN_FAILURE_EXIT_CODE;
            }
        };

        let waited = self.timeout.enforce(child.wait()).await;
        match waited {
            Some(Ok(status)) => normalize_exit_status(status),
            Some(Err(e)) => {
                warn!(command = %command, error = %e, "Failed to wait for command");
                UNKNOWN_EXIT_CODE
            }
            None => {
                warn!(
                    command = %command,
                    timeout = ?self.timeout.start_to_close,
                    "Command timed out, killing"
                );
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "Kill after timeout failed");
                }
                TIMEOUT_EXIT_CODE
            }
        }
    }
}

/// Marks every command successful without executing it
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

#[async_trait]
impl CommandRunner for DryRunRunner {
    async fn run(&self, command: &CommandUnit) -> i32 {
        debug!(command = %command, "Dry run, skipping execution");
        0
    }
}
