//! Failure recorder
//!
//! Every failed attempt becomes one [`AttemptRecord`]. Workers never touch the
//! sink directly: they hold a cloned [`FailureRecorder`] and send whole records
//! over a channel to a single collector task that owns the sink. A record is
//! therefore either fully written or not written at all, and no lock is shared
//! between workers.
//!
//! # Example
//!
//! ```ignore
//! let sink = CsvFailureSink::create("logs/failures.csv").await?;
//! let (recorder, collector) = FailureRecorder::spawn(Box::new(sink));
//!
//! // hand recorder clones to workers ...
//! drop(recorder);
//!
//! let log = collector.finish().await?;
//! ```

mod csv;
mod sink;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::error::RecorderError;

pub use csv::{format_row, quote_field, CsvFailureSink, CSV_HEADER};
pub use sink::{FailureSink, NullFailureSink};

/// One failed execution attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub timestamp: DateTime<Utc>,
    /// Command text as read from input
    pub command: String,
    /// Input position of the command
    pub command_index: usize,
    /// Worker that ran the attempt
    pub worker_id: usize,
    /// 1-based attempt number
    pub attempt: u32,
    pub exit_code: i32,
    /// True only for the attempt that exhausted the command's retries
    pub final_attempt: bool,
}

impl AttemptRecord {
    /// Fields that identify the attempt independent of timing and placement
    pub fn key(&self) -> (usize, &str, u32, i32, bool) {
        (
            self.command_index,
            self.command.as_str(),
            self.attempt,
            self.exit_code,
            self.final_attempt,
        )
    }
}

/// All records collected during a run, available after the join barrier
#[derive(Debug, Clone, Default)]
pub struct FailureLog {
    pub records: Vec<AttemptRecord>,
    /// Location of the persisted log, if any
    pub path: Option<PathBuf>,
    /// Records the sink failed to persist (still kept in `records`)
    pub sink_errors: usize,
}

impl FailureLog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records marking an exhausted command
    pub fn exhausted_count(&self) -> usize {
        self.records.iter().filter(|r| r.final_attempt).count()
    }

    /// First `n` records in arrival order
    pub fn samples(&self, n: usize) -> &[AttemptRecord] {
        &self.records[..n.min(self.records.len())]
    }

    /// Records sorted by command position and attempt, for order-free comparison
    pub fn sorted_keys(&self) -> Vec<(usize, &str, u32, i32, bool)> {
        let mut keys: Vec<_> = self.records.iter().map(AttemptRecord::key).collect();
        keys.sort();
        keys
    }
}

/// Cloneable handle workers use to append records
#[derive(Debug, Clone)]
pub struct FailureRecorder {
    tx: mpsc::UnboundedSender<AttemptRecord>,
}

/// Owns the collector task; yields the [`FailureLog`] once every recorder is dropped
#[derive(Debug)]
pub struct FailureCollector {
    handle: JoinHandle<FailureLog>,
}

impl FailureRecorder {
    /// Start the collector task writing into `sink`
    pub fn spawn(mut sink: Box<dyn FailureSink>) -> (FailureRecorder, FailureCollector) {
        let (tx, mut rx) = mpsc::unbounded_channel::<AttemptRecord>();

        let handle = tokio::spawn(async move {
            let mut log = FailureLog {
                path: sink.path().map(|p| p.to_path_buf()),
                ..Default::default()
            };

            while let Some(record) = rx.recv().await {
                if let Err(e) = sink.append(&record).await {
                    error!(
                        command = %record.command,
                        attempt = record.attempt,
                        error = %e,
                        "Failed to persist attempt record"
                    );
                    log.sink_errors += 1;
                }
                log.records.push(record);
            }

            if let Err(e) = sink.finish().await {
                error!(error = %e, "Failed to finalize failure log");
                log.sink_errors += 1;
            }
            debug!(records = log.records.len(), "Failure collector exited");
            log
        });

        (FailureRecorder { tx }, FailureCollector { handle })
    }

    /// Append one record
    pub fn append(&self, record: AttemptRecord) -> Result<(), RecorderError> {
        self.tx
            .send(record)
            .map_err(|_| RecorderError::CollectorLost("channel closed".into()))
    }
}

impl FailureCollector {
    /// Wait for all recorders to drop and return the collected log
    pub async fn finish(self) -> Result<FailureLog, RecorderError> {
        self.handle
            .await
            .map_err(|e| RecorderError::CollectorLost(e.to_string()))
    }
}
