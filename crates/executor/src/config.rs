// Run configuration
//
// Decision: One flat struct with builder-style setters; the CLI maps its
// flags (and FANOUT_* env fallbacks) onto it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::partition::{BalancedPartitioner, ChunkedPartitioner, PartitionPolicy};
use crate::reliability::{RetryPolicy, TimeoutConfig};

/// Default number of workers
pub const DEFAULT_WORKER_COUNT: usize = 100;

/// Default attempts per command
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How commands are laid out over workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// `min(N, W)` batches of near-equal size
    #[default]
    Balanced,
    /// Fixed chunk size `ceil(N / W)`
    Chunked,
}

impl PartitionStrategy {
    pub fn policy(&self) -> Box<dyn PartitionPolicy> {
        match self {
            PartitionStrategy::Balanced => Box::new(BalancedPartitioner),
            PartitionStrategy::Chunked => Box::new(ChunkedPartitioner),
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionStrategy::Balanced => f.write_str("balanced"),
            PartitionStrategy::Chunked => f.write_str("chunked"),
        }
    }
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "balanced" => Ok(PartitionStrategy::Balanced),
            "chunked" => Ok(PartitionStrategy::Chunked),
            other => Err(format!(
                "unknown partition strategy '{other}' (expected balanced or chunked)"
            )),
        }
    }
}

/// Settings for one executor run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    /// Newline-delimited list of commands
    pub commands_file: PathBuf,

    /// Worker budget (upper bound on parallel batches)
    pub worker_count: usize,

    /// Attempts per command, including the first
    pub max_retries: u32,

    /// Constant delay between attempts
    #[serde(with = "crate::reliability::retry::duration_millis")]
    pub retry_delay: Duration,

    /// Limit per attempt
    pub timeout: TimeoutConfig,

    /// Mark every command successful without executing it
    pub dry_run: bool,

    /// Drop repeated command lines, keeping the first
    pub dedupe: bool,

    pub partition: PartitionStrategy,

    /// Explicit failure CSV path; overrides the `log_dir` default
    pub failure_log: Option<PathBuf>,

    /// Directory for default artifacts
    pub log_dir: Option<PathBuf>,

    /// JSON-lines file receiving one summary record per run
    pub summary_file: Option<PathBuf>,
}

impl RunConfig {
    /// Create a configuration with defaults for everything but the input
    pub fn new(commands_file: impl Into<PathBuf>) -> Self {
        Self {
            commands_file: commands_file.into(),
            worker_count: DEFAULT_WORKER_COUNT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            timeout: TimeoutConfig::default(),
            dry_run: false,
            dedupe: false,
            partition: PartitionStrategy::default(),
            failure_log: None,
            log_dir: None,
            summary_file: None,
        }
    }

    /// Set the worker budget
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set attempts per command
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the delay between attempts
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enable or disable dry run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable or disable deduplication
    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Set the partitioning strategy
    pub fn with_partition(mut self, partition: PartitionStrategy) -> Self {
        self.partition = partition;
        self
    }

    /// Write failures to an explicit path
    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = Some(path.into());
        self
    }

    /// Place default artifacts under `dir`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Append the run summary to `path`
    pub fn with_summary_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_file = Some(path.into());
        self
    }

    /// Reject settings that cannot produce a meaningful run
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::setting("worker_count", "must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::setting("max_retries", "must be at least 1"));
        }
        if self.commands_file.as_os_str().is_empty() {
            return Err(ConfigError::setting("commands_file", "must not be empty"));
        }
        Ok(())
    }

    /// Retry policy derived from the settings
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.retry_delay, self.max_retries)
    }

    /// Failure CSV location for `run_tag`, if any
    pub fn failure_log_path(&self, run_tag: &str) -> Option<PathBuf> {
        self.failure_log.clone().or_else(|| {
            self.log_dir
                .as_deref()
                .map(|dir| default_failure_log(dir, run_tag))
        })
    }
}

fn default_failure_log(dir: &Path, run_tag: &str) -> PathBuf {
    dir.join(format!("failures_{run_tag}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("cmds.txt");
        assert_eq!(config.worker_count, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.timeout.start_to_close, Some(Duration::from_secs(300)));
        assert!(!config.dry_run);
        assert!(!config.dedupe);
        assert_eq!(config.partition, PartitionStrategy::Balanced);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::new("cmds.txt")
            .with_worker_count(5)
            .with_max_retries(2)
            .with_retry_delay(Duration::ZERO)
            .with_timeout(TimeoutConfig::unbounded())
            .with_dry_run(true)
            .with_dedupe(true)
            .with_partition(PartitionStrategy::Chunked);

        assert_eq!(config.worker_count, 5);
        assert_eq!(config.retry_policy(), RetryPolicy::fixed(Duration::ZERO, 2));
        assert!(config.timeout.start_to_close.is_none());
        assert!(config.dry_run && config.dedupe);
        assert_eq!(config.partition, PartitionStrategy::Chunked);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let err = RunConfig::new("c.txt").with_worker_count(0).validate().unwrap_err();
        assert!(err.to_string().contains("worker_count"));

        let err = RunConfig::new("c.txt").with_max_retries(0).validate().unwrap_err();
        assert!(err.to_string().contains("max_retries"));

        let err = RunConfig::new("").validate().unwrap_err();
        assert!(err.to_string().contains("commands_file"));
    }

    #[test]
    fn test_failure_log_path() {
        let config = RunConfig::new("c.txt");
        assert_eq!(config.failure_log_path("x"), None);

        let config = config.with_log_dir("logs");
        assert_eq!(
            config.failure_log_path("20260101"),
            Some(PathBuf::from("logs/failures_20260101.csv"))
        );

        let config = config.with_failure_log("/tmp/f.csv");
        assert_eq!(config.failure_log_path("x"), Some(PathBuf::from("/tmp/f.csv")));
    }

    #[test]
    fn test_partition_strategy_parse() {
        assert_eq!(
            "balanced".parse::<PartitionStrategy>(),
            Ok(PartitionStrategy::Balanced)
        );
        assert_eq!(
            "CHUNKED".parse::<PartitionStrategy>(),
            Ok(PartitionStrategy::Chunked)
        );
        assert!("random".parse::<PartitionStrategy>().is_err());
        assert_eq!(PartitionStrategy::Chunked.to_string(), "chunked");
    }

    #[test]
    fn test_serialization() {
        let config = RunConfig::new("c.txt").with_retry_delay(Duration::from_millis(500));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["retry_delay"], 500);
        assert_eq!(json["partition"], "balanced");

        let parsed: RunConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }
}
