//! CSV failure log
//!
//! One row per failed attempt under the header `timestamp,command,attempt,exit_code`.
//! Command text is always quoted so embedded commas, quotes and newlines
//! survive. Each row is flushed on its own so a crash leaves only whole rows.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::SecondsFormat;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use super::{AttemptRecord, FailureSink};
use crate::error::RecorderError;

/// Header row of the failure CSV
pub const CSV_HEADER: &str = "timestamp,command,attempt,exit_code";

/// Quote a field RFC 4180 style, doubling embedded quotes
pub fn quote_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Render one record as a CSV row, newline included
pub fn format_row(record: &AttemptRecord) -> String {
    format!(
        "{},{},{},{}\n",
        record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        quote_field(&record.command),
        record.attempt,
        record.exit_code
    )
}

/// Append-only CSV file sink
#[derive(Debug)]
pub struct CsvFailureSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvFailureSink {
    /// Create (or truncate) the file and write the header
    ///
    /// Parent directories are created on demand.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = File::create(&path).await?;
        let mut writer = BufWriter::new(file);
        writer.write_all(CSV_HEADER.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        info!(path = %path.display(), "Failure log created");
        Ok(Self { path, writer })
    }
}

#[async_trait]
impl FailureSink for CsvFailureSink {
    async fn append(&mut self, record: &AttemptRecord) -> Result<(), RecorderError> {
        let row = format_row(record);
        self.writer.write_all(row.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RecorderError> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await?;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(command: &str, attempt: u32) -> AttemptRecord {
        AttemptRecord {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            command: command.to_string(),
            command_index: 0,
            worker_id: 0,
            attempt,
            exit_code: 2,
            final_attempt: false,
        }
    }

    #[test]
    fn test_quote_field() {
        assert_eq!(quote_field("plain"), "\"plain\"");
        assert_eq!(quote_field("a,b"), "\"a,b\"");
        assert_eq!(quote_field(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn test_format_row() {
        let row = format_row(&record("sendevent -J A,B", 1));
        assert_eq!(row, "2026-01-02T03:04:05Z,\"sendevent -J A,B\",1,2\n");
    }

    #[tokio::test]
    async fn test_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/failures.csv");

        let mut sink = CsvFailureSink::create(&path).await.unwrap();
        assert_eq!(sink.path(), Some(path.as_path()));
        sink.append(&record("echo 'x'", 1)).await.unwrap();
        sink.append(&record("echo \"y\"", 2)).await.unwrap();
        sink.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2026-01-02T03:04:05Z,\"echo 'x'\",1,2");
        assert_eq!(lines[2], "2026-01-02T03:04:05Z,\"echo \"\"y\"\"\",2,2");
    }

    #[tokio::test]
    async fn test_header_only_when_no_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failures.csv");

        let mut sink = CsvFailureSink::create(&path).await.unwrap();
        sink.finish().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{CSV_HEADER}\n"));
    }
}
