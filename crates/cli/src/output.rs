// Output formatting for CLI

use anyhow::Result;
use fanout_executor::recorder::{format_row, FailureLog};
use fanout_executor::RunSummary;
use serde::Serialize;

/// Failure rows shown in the text report
pub const SAMPLE_ROWS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    pub fn render_value<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        Ok(match self {
            OutputFormat::Json => Some(serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
            // Text format is handled by the report
            OutputFormat::Text => None,
        })
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Format a simple key-value pair for text output
pub fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{:<14} {}", format!("{}:", label), value)
}

fn rule() -> String {
    "=".repeat(60)
}

/// Counts, elapsed time and rate; printed even in quiet mode
fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![field("Total", summary.total)];
    lines.push(field("Success", summary.success));
    lines.push(field("Failed", summary.failed));
    if summary.cancelled > 0 {
        lines.push(field("Cancelled", summary.cancelled));
    }
    lines.push(field(
        "Workers",
        format!("{} ({} batches)", summary.worker_count, summary.batches),
    ));
    lines.push(field("Elapsed", format!("{:.2}s", summary.elapsed_seconds)));
    lines.push(field("Rate", format!("{:.1} cmd/s", summary.rate)));
    lines
}

/// Summary block alone, for `--quiet`
pub fn compact_report(summary: &RunSummary) -> String {
    summary_lines(summary).join("\n")
}

/// Render the human-readable run report
///
/// Failure details (log path, sample rows) appear only when something failed.
pub fn text_report(summary: &RunSummary, log: &FailureLog) -> String {
    let mut lines = vec![rule(), "RUN SUMMARY".to_string(), rule()];

    lines.push(field("Input", summary.input_file.display()));
    if summary.dry_run {
        lines.push(field("Mode", "DRY RUN"));
    }
    lines.extend(summary_lines(summary));

    for failure in &summary.worker_failures {
        lines.push(field(
            "Worker error",
            format!(
                "worker {} lost {} commands: {}",
                failure.worker_id, failure.batch_len, failure.reason
            ),
        ));
    }
    if summary.sink_errors > 0 {
        lines.push(field(
            "Log errors",
            format!("{} records not persisted", summary.sink_errors),
        ));
    }

    if !log.is_empty() {
        lines.push(String::new());
        if let Some(path) = &summary.failure_log_path {
            lines.push(field("Failure log", path.display()));
        }
        lines.push(format!("Sample failures (first {}):", SAMPLE_ROWS.min(log.len())));
        for record in log.samples(SAMPLE_ROWS) {
            lines.push(format!("  {}", format_row(record).trim_end()));
        }
        if log.len() > SAMPLE_ROWS {
            lines.push(format!("  ... and {} more", log.len() - SAMPLE_ROWS));
        }
    }

    lines.push(rule());
    lines.join("\n")
}
