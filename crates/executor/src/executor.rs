//! Batch executor
//!
//! Drives a full run: load, partition, execute under the pool, join, then
//! aggregate. Configuration errors surface before any artifact is created.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::command::{load_commands, CommandUnit};
use crate::config::RunConfig;
use crate::error::{ConfigError, Result};
use crate::partition::PartitionPolicy;
use crate::recorder::{CsvFailureSink, FailureLog, FailureRecorder, FailureSink, NullFailureSink};
use crate::report::{RunContext, RunSummary};
use crate::runner::{CommandRunner, DryRunRunner, ProcessRunner};
use crate::worker::{WorkerFailure, WorkerPool, WorkerResult};

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub failure_log: FailureLog,
    pub worker_results: Vec<WorkerResult>,
}

impl RunOutcome {
    pub fn worker_failures(&self) -> &[WorkerFailure] {
        &self.summary.worker_failures
    }
}

/// Runs one command list end to end
///
/// # Example
///
/// ```ignore
/// let outcome = BatchExecutor::new(RunConfig::new("cmds.txt").with_worker_count(8))
///     .run()
///     .await?;
/// println!("{} ok, {} failed", outcome.summary.success, outcome.summary.failed);
/// ```
pub struct BatchExecutor {
    config: RunConfig,
    runner: Option<Arc<dyn CommandRunner>>,
    partitioner: Option<Box<dyn PartitionPolicy>>,
    sink: Option<Box<dyn FailureSink>>,
    shutdown_rx: Option<watch::Receiver<bool>>,
}

impl BatchExecutor {
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            runner: None,
            partitioner: None,
            sink: None,
            shutdown_rx: None,
        }
    }

    /// Execute attempts with `runner` instead of spawning processes
    ///
    /// Ignored when the configuration asks for a dry run.
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Override the partitioning policy chosen by the configuration
    pub fn with_partitioner(mut self, partitioner: Box<dyn PartitionPolicy>) -> Self {
        self.partitioner = Some(partitioner);
        self
    }

    /// Send failed attempts to `sink` instead of the configured CSV
    pub fn with_failure_sink(mut self, sink: Box<dyn FailureSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Stop workers at the next safe point once `rx` turns `true`
    pub fn with_shutdown(mut self, rx: watch::Receiver<bool>) -> Self {
        self.shutdown_rx = Some(rx);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Load commands from the configured file and run them
    pub async fn run(self) -> Result<RunOutcome> {
        self.config.validate()?;
        let commands = load_commands(&self.config.commands_file, self.config.dedupe)?;
        self.run_commands(commands).await
    }

    /// Run an already-loaded command list
    #[instrument(skip_all, fields(total = commands.len(), workers = self.config.worker_count))]
    pub async fn run_commands(self, commands: Vec<CommandUnit>) -> Result<RunOutcome> {
        self.config.validate()?;
        if commands.is_empty() {
            return Err(ConfigError::EmptyInput(self.config.commands_file.clone()).into());
        }

        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let clock = Instant::now();
        let total = commands.len();

        let partitioner = self
            .partitioner
            .unwrap_or_else(|| self.config.partition.policy());
        let batches = partitioner.partition(commands, self.config.worker_count);

        let sink: Box<dyn FailureSink> = match self.sink {
            Some(sink) => sink,
            None => match self.config.failure_log_path(&run_tag(started_at, run_id)) {
                Some(path) => Box::new(CsvFailureSink::create(path).await?),
                None => Box::new(NullFailureSink),
            },
        };
        let (recorder, collector) = FailureRecorder::spawn(sink);

        let runner: Arc<dyn CommandRunner> = if self.config.dry_run {
            Arc::new(DryRunRunner)
        } else {
            let timeout = self.config.timeout;
            self.runner
                .unwrap_or_else(|| Arc::new(ProcessRunner::new(timeout)) as Arc<dyn CommandRunner>)
        };

        info!(
            %run_id,
            total,
            batches = batches.len(),
            worker_count = self.config.worker_count,
            max_retries = self.config.max_retries,
            retry_delay_ms = self.config.retry_delay.as_millis() as u64,
            dry_run = self.config.dry_run,
            "Starting run"
        );

        let mut pool = WorkerPool::new(runner, self.config.retry_policy());
        if let Some(rx) = self.shutdown_rx {
            pool = pool.with_shutdown(rx);
        }
        let pool_outcome = pool.run(batches, recorder).await;
        let failure_log = collector.finish().await?;

        let context = RunContext {
            run_id,
            started_at,
            input_file: self.config.commands_file.clone(),
            total,
            worker_count: self.config.worker_count,
            dry_run: self.config.dry_run,
        };
        let summary = RunSummary::aggregate(
            &context,
            &pool_outcome.results,
            pool_outcome.failures,
            &failure_log,
            clock.elapsed(),
        );

        if let Some(path) = &self.config.summary_file {
            if let Err(e) = summary.append_to(path).await {
                warn!(path = %path.display(), error = %e, "Failed to write run summary");
            }
        }

        info!(
            %run_id,
            success = summary.success,
            failed = summary.failed,
            cancelled = summary.cancelled,
            elapsed_seconds = summary.elapsed_seconds,
            "Run complete"
        );

        Ok(RunOutcome {
            summary,
            failure_log,
            worker_results: pool_outcome.results,
        })
    }
}

/// Tag naming a run's default artifacts: start time plus the random tail of
/// the run id, so runs started within the same second never share a file
fn run_tag(started_at: DateTime<Utc>, run_id: Uuid) -> String {
    let id = run_id.simple().to_string();
    format!("{}_{}", started_at.format("%Y%m%d_%H%M%S"), &id[id.len() - 8..])
}
