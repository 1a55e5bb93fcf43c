//! Failure sink trait definition

use std::path::Path;

use async_trait::async_trait;

use super::AttemptRecord;
use crate::error::RecorderError;

/// Durable destination for attempt records
///
/// Only the collector task calls a sink, so implementations need no internal
/// synchronization. `append` must persist the record as one unit.
#[async_trait]
pub trait FailureSink: Send {
    /// Persist one record
    async fn append(&mut self, record: &AttemptRecord) -> Result<(), RecorderError>;

    /// Flush and release resources after the last record
    async fn finish(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    /// Where records end up, if on disk
    fn path(&self) -> Option<&Path> {
        None
    }
}

/// Discards records; the collector still keeps them in memory
#[derive(Debug, Clone, Copy, Default)]
pub struct NullFailureSink;

#[async_trait]
impl FailureSink for NullFailureSink {
    async fn append(&mut self, _record: &AttemptRecord) -> Result<(), RecorderError> {
        Ok(())
    }
}
