//! # Parallel Batch Executor
//!
//! Executes a list of independent, opaque commands under a fixed-size worker
//! pool with bounded retries and a concurrency-safe failure log.
//!
//! ## Features
//!
//! - **Contiguous partitioning**: commands are split into at most `worker_count` batches
//! - **Fixed worker pool**: one task per batch, joined at a single barrier
//! - **Bounded retries**: constant delay between attempts, no backoff
//! - **Failure log**: every failed attempt is recorded once, as a whole record
//! - **Run summary**: per-worker counts reduced after the join
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌─────────────────────────────┐
//! │ Input Loader │──▶│ PartitionPolicy  │──▶│         WorkerPool          │
//! │ (CommandUnit)│   │ (Vec<Batch>)     │   │ [worker 0] ... [worker W-1] │
//! └──────────────┘   └──────────────────┘   │  RetryEngine per command    │
//!                                           └──────────────┬──────────────┘
//!                                                          │ AttemptRecord
//!                                                          ▼
//!                    ┌──────────────────┐   ┌─────────────────────────────┐
//!                    │    RunSummary    │◀──│ FailureRecorder (collector) │
//!                    │  (after join)    │   │   FailureSink (CSV)         │
//!                    └──────────────────┘   └─────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use fanout_executor::prelude::*;
//!
//! let config = RunConfig::new("inactive_commands.txt")
//!     .with_worker_count(20)
//!     .with_max_retries(3);
//!
//! let outcome = BatchExecutor::new(config).run().await?;
//! std::process::exit(outcome.summary.exit_status());
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod partition;
pub mod recorder;
pub mod reliability;
pub mod report;
pub mod runner;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::command::{load_commands, CommandUnit, Invocation};
    pub use crate::config::{PartitionStrategy, RunConfig};
    pub use crate::error::{ConfigError, RecorderError, RunError};
    pub use crate::executor::{BatchExecutor, RunOutcome};
    pub use crate::partition::{Batch, BalancedPartitioner, ChunkedPartitioner, PartitionPolicy};
    pub use crate::recorder::{AttemptRecord, CsvFailureSink, FailureLog, FailureRecorder};
    pub use crate::reliability::{RetryPolicy, TimeoutConfig};
    pub use crate::report::RunSummary;
    pub use crate::runner::{CommandRunner, DryRunRunner, ProcessRunner};
    pub use crate::worker::{WorkerFailure, WorkerPool, WorkerResult};
}

// Re-export key types at crate root
pub use command::{load_commands, CommandUnit, Invocation};
pub use config::{PartitionStrategy, RunConfig};
pub use error::{ConfigError, RecorderError, RunError};
pub use executor::{BatchExecutor, RunOutcome};
pub use partition::{Batch, BalancedPartitioner, ChunkedPartitioner, PartitionPolicy};
pub use recorder::{AttemptRecord, FailureLog, FailureRecorder};
pub use reliability::{RetryPolicy, TimeoutConfig};
pub use report::RunSummary;
pub use runner::{CommandRunner, DryRunRunner, ProcessRunner};
pub use worker::{WorkerFailure, WorkerPool, WorkerResult};
