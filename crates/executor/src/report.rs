//! Result aggregation and the run summary
//!
//! Runs only after the join barrier, when every [`WorkerResult`] is final, so
//! the reduction needs no locking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::recorder::FailureLog;
use crate::worker::{WorkerFailure, WorkerResult};

/// Exit status: every command succeeded
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status: at least one command exhausted its retries
pub const EXIT_COMMAND_FAILURES: i32 = 1;
/// Exit status: configuration or input error, nothing ran
pub const EXIT_CONFIG_ERROR: i32 = 2;
/// Exit status: a worker terminated without reporting
pub const EXIT_WORKER_FAILURE: i32 = 3;
/// Exit status: the run aborted because its failure log or output could not be
/// written
pub const EXIT_RUN_ERROR: i32 = 4;
/// Exit status: the run was cancelled
pub const EXIT_CANCELLED: i32 = 130;

/// Run-level facts known before aggregation
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub input_file: PathBuf,
    pub total: usize,
    pub worker_count: usize,
    pub dry_run: bool,
}

/// Aggregate of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub input_file: PathBuf,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Configured worker budget
    pub worker_count: usize,
    /// Batches actually launched
    pub batches: usize,
    pub elapsed_seconds: f64,
    /// Commands per second, with elapsed floored at one second
    pub rate: f64,
    /// Failed attempts recorded, across all commands
    pub failure_records: usize,
    pub failure_log_path: Option<PathBuf>,
    #[serde(default)]
    pub worker_failures: Vec<WorkerFailure>,
    #[serde(default)]
    pub sink_errors: usize,
    pub dry_run: bool,
    /// Exhaustion records agree with the failure count
    pub consistent: bool,
}

impl RunSummary {
    /// Reduce worker results and the failure log into one summary
    pub fn aggregate(
        context: &RunContext,
        results: &[WorkerResult],
        worker_failures: Vec<WorkerFailure>,
        log: &FailureLog,
        elapsed: Duration,
    ) -> Self {
        let success: usize = results.iter().map(|r| r.success_count).sum();
        let failed: usize = results.iter().map(|r| r.failure_count).sum();
        let cancelled: usize = results.iter().map(|r| r.cancelled_count).sum();

        let exhausted = log.exhausted_count();
        let consistent = exhausted == failed;
        if !consistent {
            warn!(
                exhausted_records = exhausted,
                failed,
                worker_failures = worker_failures.len(),
                "Failure log disagrees with worker counts"
            );
        }

        let elapsed_seconds = elapsed.as_secs_f64();
        Self {
            run_id: context.run_id,
            timestamp: context.started_at,
            input_file: context.input_file.clone(),
            total: context.total,
            success,
            failed,
            cancelled,
            worker_count: context.worker_count,
            batches: results.len() + worker_failures.len(),
            elapsed_seconds,
            rate: context.total as f64 / elapsed_seconds.max(1.0),
            failure_records: log.len(),
            failure_log_path: log.path.clone(),
            worker_failures,
            sink_errors: log.sink_errors,
            dry_run: context.dry_run,
            consistent,
        }
    }

    /// Process exit status for this run
    ///
    /// Worker failures take precedence over command failures, since lost
    /// batches may hide further failures.
    pub fn exit_status(&self) -> i32 {
        if !self.worker_failures.is_empty() {
            EXIT_WORKER_FAILURE
        } else if self.cancelled > 0 {
            EXIT_CANCELLED
        } else if self.failed > 0 {
            EXIT_COMMAND_FAILURES
        } else {
            EXIT_SUCCESS
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_status() == EXIT_SUCCESS
    }

    /// Commands in batches whose worker never reported
    pub fn unaccounted(&self) -> usize {
        self.worker_failures.iter().map(|f| f.batch_len).sum()
    }

    /// Append this summary as one JSON line to `path`
    pub async fn append_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(self).map_err(std::io::Error::other)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        info!(path = %path.display(), "Run summary appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::AttemptRecord;

    fn context(total: usize) -> RunContext {
        RunContext {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            input_file: PathBuf::from("cmds.txt"),
            total,
            worker_count: 4,
            dry_run: false,
        }
    }

    fn result(worker_id: usize, success: usize, failed: usize) -> WorkerResult {
        WorkerResult {
            worker_id,
            batch_len: success + failed,
            success_count: success,
            failure_count: failed,
            cancelled_count: 0,
        }
    }

    fn exhausted(index: usize) -> AttemptRecord {
        AttemptRecord {
            timestamp: Utc::now(),
            command: format!("cmd {index}"),
            command_index: index,
            worker_id: 0,
            attempt: 1,
            exit_code: 1,
            final_attempt: true,
        }
    }

    #[test]
    fn test_aggregate_sums_workers() {
        let log = FailureLog {
            records: vec![exhausted(1), exhausted(6)],
            ..Default::default()
        };
        let summary = RunSummary::aggregate(
            &context(10),
            &[result(0, 4, 1), result(1, 4, 1)],
            vec![],
            &log,
            Duration::from_secs(4),
        );

        assert_eq!(summary.success, 8);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.batches, 2);
        assert_eq!(summary.failure_records, 2);
        assert!(summary.consistent);
        assert_eq!(summary.rate, 2.5);
        assert_eq!(summary.exit_status(), EXIT_COMMAND_FAILURES);
    }

    #[test]
    fn test_rate_floors_elapsed_at_one_second() {
        let summary = RunSummary::aggregate(
            &context(5),
            &[result(0, 5, 0)],
            vec![],
            &FailureLog::default(),
            Duration::from_millis(10),
        );
        assert_eq!(summary.rate, 5.0);
        assert!(summary.is_success());
    }

    #[test]
    fn test_inconsistent_log_flagged() {
        let summary = RunSummary::aggregate(
            &context(2),
            &[result(0, 1, 1)],
            vec![],
            &FailureLog::default(),
            Duration::from_secs(1),
        );
        assert!(!summary.consistent);
    }

    #[test]
    fn test_worker_failure_takes_precedence() {
        let failure = WorkerFailure {
            worker_id: 1,
            batch_len: 3,
            reason: "worker panicked: boom".into(),
        };
        let summary = RunSummary::aggregate(
            &context(6),
            &[result(0, 2, 1)],
            vec![failure],
            &FailureLog {
                records: vec![exhausted(2)],
                ..Default::default()
            },
            Duration::from_secs(1),
        );
        assert_eq!(summary.exit_status(), EXIT_WORKER_FAILURE);
        assert_eq!(summary.unaccounted(), 3);
        assert_eq!(summary.batches, 2);
    }

    #[test]
    fn test_cancelled_exit_status() {
        let mut worker = result(0, 1, 0);
        worker.cancelled_count = 2;
        let summary = RunSummary::aggregate(
            &context(3),
            &[worker],
            vec![],
            &FailureLog::default(),
            Duration::from_secs(1),
        );
        assert_eq!(summary.cancelled, 2);
        assert_eq!(summary.exit_status(), EXIT_CANCELLED);
    }

    #[tokio::test]
    async fn test_append_to_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs/summary.jsonl");
        let summary = RunSummary::aggregate(
            &context(1),
            &[result(0, 1, 0)],
            vec![],
            &FailureLog::default(),
            Duration::from_secs(1),
        );

        summary.append_to(&path).await.unwrap();
        summary.append_to(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: RunSummary = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.run_id, summary.run_id);
        assert_eq!(parsed.success, 1);
    }
}
