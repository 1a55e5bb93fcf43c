// Fanout CLI
//
// Design Decision: Use clap derive with FANOUT_* env fallbacks for every flag.
// Design Decision: Logs go to stderr so stdout carries only the report.
// Design Decision: Support text/json/yaml output formats for scripting.

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use fanout_executor::recorder::FailureLog;
use fanout_executor::report::EXIT_RUN_ERROR;
use fanout_executor::{
    BatchExecutor, ConfigError, PartitionStrategy, RunConfig, RunError, RunSummary, TimeoutConfig,
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::output::{compact_report, text_report, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(about = "Fanout - Run a list of commands in parallel with bounded retries")]
#[command(version)]
pub struct Cli {
    /// File with one command per line
    #[arg(long, short, env = "FANOUT_COMMANDS_FILE")]
    pub file: PathBuf,

    /// Number of parallel workers
    #[arg(
        long,
        short,
        visible_alias = "workers",
        env = "FANOUT_THREADS",
        default_value = "100"
    )]
    pub threads: usize,

    /// Attempts per command, including the first
    #[arg(long, short, env = "FANOUT_RETRIES", default_value = "3")]
    pub retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, env = "FANOUT_DELAY", default_value = "1", value_parser = parse_seconds)]
    pub delay: Duration,

    /// Per-attempt timeout in seconds (0 disables it)
    #[arg(long, env = "FANOUT_TIMEOUT", default_value = "300")]
    pub timeout: u64,

    /// Report every command as successful without running it
    #[arg(long, env = "FANOUT_DRY_RUN")]
    pub dry_run: bool,

    /// Drop repeated command lines
    #[arg(long, env = "FANOUT_DEDUPE")]
    pub dedupe: bool,

    /// How commands are split across workers
    #[arg(long, env = "FANOUT_PARTITION", default_value = "balanced", value_parser = ["balanced", "chunked"])]
    pub partition: String,

    /// Failure CSV path (defaults to <log-dir>/failures_<timestamp>_<run id tail>.csv)
    #[arg(long, env = "FANOUT_FAILURE_LOG")]
    pub failure_log: Option<PathBuf>,

    /// Directory for default artifacts
    #[arg(long, env = "FANOUT_LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Append the run summary as a JSON line to this file
    #[arg(long, env = "FANOUT_SUMMARY_FILE")]
    pub summary_file: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    /// Suppress non-essential output
    #[arg(long, short)]
    pub quiet: bool,
}

impl Cli {
    fn run_config(&self) -> Result<RunConfig, RunError> {
        let partition: PartitionStrategy = self
            .partition
            .parse()
            .map_err(|e: String| ConfigError::setting("partition", e))?;

        let mut config = RunConfig::new(&self.file)
            .with_worker_count(self.threads)
            .with_max_retries(self.retries)
            .with_retry_delay(self.delay)
            .with_timeout(TimeoutConfig::from_secs(self.timeout))
            .with_dry_run(self.dry_run)
            .with_dedupe(self.dedupe)
            .with_partition(partition)
            .with_log_dir(&self.log_dir);
        if let Some(path) = &self.failure_log {
            config = config.with_failure_log(path);
        }
        if let Some(path) = &self.summary_file {
            config = config.with_summary_file(path);
        }
        Ok(config)
    }
}

fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("'{s}' is not a valid delay"))
}

/// Filter used when `RUST_LOG` is unset; the binary's own target is `fanout`
fn default_filter(quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else {
        "fanout=info,fanout_executor=info"
    }
}

fn init_tracing(quiet: bool) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(quiet).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match run(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(e) => {
            eprintln!("Error: {e:#}");
            let status = e
                .downcast_ref::<RunError>()
                .map(RunError::exit_status)
                .unwrap_or(EXIT_RUN_ERROR);
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }
    }
}

/// Render what goes to stdout
///
/// `--quiet` trims the text report to its summary lines; it never hides them.
fn render_report(
    format: OutputFormat,
    quiet: bool,
    summary: &RunSummary,
    log: &FailureLog,
) -> anyhow::Result<String> {
    if !format.is_text() {
        return Ok(format.render_value(summary)?.unwrap_or_default());
    }
    Ok(if quiet {
        compact_report(summary)
    } else {
        text_report(summary, log)
    })
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let output_format = OutputFormat::from_str(&cli.output);
    let config = cli.run_config()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping workers");
            let _ = shutdown_tx.send(true);
        }
    });

    let outcome = BatchExecutor::new(config)
        .with_shutdown(shutdown_rx)
        .run()
        .await?;

    let report = render_report(
        output_format,
        cli.quiet,
        &outcome.summary,
        &outcome.failure_log,
    )?;
    println!("{report}");

    let status = outcome.summary.exit_status();
    Ok(u8::try_from(status).unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_map_to_run_config() {
        let cli = Cli::try_parse_from(["fanout", "--file", "cmds.txt"]).unwrap();
        let config = cli.run_config().unwrap();

        assert_eq!(config.commands_file, PathBuf::from("cmds.txt"));
        assert_eq!(config.worker_count, 100);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.timeout.start_to_close, Some(Duration::from_secs(300)));
        assert_eq!(config.partition, PartitionStrategy::Balanced);
        assert_eq!(config.log_dir, Some(PathBuf::from("logs")));
        assert!(config.failure_log.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn test_flags_map_to_run_config() {
        let cli = Cli::try_parse_from([
            "fanout",
            "-f",
            "jobs.txt",
            "--workers",
            "8",
            "-r",
            "5",
            "--delay",
            "0.25",
            "--timeout",
            "0",
            "--dry-run",
            "--dedupe",
            "--partition",
            "chunked",
            "--failure-log",
            "out/fail.csv",
            "-o",
            "json",
        ])
        .unwrap();
        let config = cli.run_config().unwrap();

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert!(config.timeout.start_to_close.is_none());
        assert!(config.dry_run && config.dedupe);
        assert_eq!(config.partition, PartitionStrategy::Chunked);
        assert_eq!(config.failure_log, Some(PathBuf::from("out/fail.csv")));
        assert_eq!(cli.output, "json");
    }

    fn sample_summary() -> RunSummary {
        RunSummary {
            run_id: uuid::Uuid::now_v7(),
            timestamp: chrono::Utc::now(),
            input_file: PathBuf::from("cmds.txt"),
            total: 2,
            success: 1,
            failed: 1,
            cancelled: 0,
            worker_count: 2,
            batches: 2,
            elapsed_seconds: 0.2,
            rate: 2.0,
            failure_records: 1,
            failure_log_path: None,
            worker_failures: vec![],
            sink_errors: 0,
            dry_run: false,
            consistent: true,
        }
    }

    #[test]
    fn test_quiet_text_still_prints_summary() {
        let summary = sample_summary();
        let report =
            render_report(OutputFormat::Text, true, &summary, &FailureLog::default()).unwrap();

        assert!(report.contains("Total:         2"));
        assert!(report.contains("Success:       1"));
        assert!(report.contains("Failed:        1"));
        assert!(report.contains("Elapsed:"));
        assert!(report.contains("Rate:"));
        assert!(!report.contains("Sample failures"));
    }

    #[test]
    fn test_structured_output_ignores_quiet() {
        let summary = sample_summary();
        let report =
            render_report(OutputFormat::Json, true, &summary, &FailureLog::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["failed"], 1);
    }

    #[test]
    fn test_default_filter_enables_binary_events() {
        let target = module_path!().split("::").next().unwrap();
        let directive = format!("{target}=info");
        assert!(default_filter(false).split(',').any(|d| d == directive));
        assert_eq!(default_filter(true), "warn");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Cli::try_parse_from(["fanout", "-f", "c.txt", "--delay", "-1"]).is_err());
        assert!(Cli::try_parse_from(["fanout", "-f", "c.txt", "--partition", "random"]).is_err());
        assert!(Cli::try_parse_from(["fanout", "-f", "c.txt", "-o", "xml"]).is_err());
        assert!(Cli::try_parse_from(["fanout"]).is_err());
    }
}
