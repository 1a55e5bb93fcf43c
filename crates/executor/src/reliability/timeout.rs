//! Per-attempt timeout configuration
//!
//! A command that runs past its limit is killed and its attempt counts as a
//! failure with [`crate::runner::TIMEOUT_EXIT_CODE`].

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default limit for a single attempt
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout configuration for command attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Maximum time from spawn to exit (None = unbounded)
    #[serde(with = "option_duration_millis")]
    pub start_to_close: Option<Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            start_to_close: Some(DEFAULT_COMMAND_TIMEOUT),
        }
    }
}

impl TimeoutConfig {
    /// Create a new timeout configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from whole seconds, `0` meaning no limit
    pub fn from_secs(secs: u64) -> Self {
        if secs == 0 {
            Self::unbounded()
        } else {
            Self::default().with_start_to_close(Duration::from_secs(secs))
        }
    }

    /// No limit on attempt duration
    pub fn unbounded() -> Self {
        Self {
            start_to_close: None,
        }
    }

    /// Set start-to-close timeout
    pub fn with_start_to_close(mut self, timeout: Duration) -> Self {
        self.start_to_close = Some(timeout);
        self
    }

    /// Await `fut` under the configured limit.
    ///
    /// Returns `None` when the limit elapsed first; the future is dropped.
    pub async fn enforce<F: Future>(&self, fut: F) -> Option<F::Output> {
        match self.start_to_close {
            Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
            None => Some(fut.await),
        }
    }
}

/// Serde support for `Option<Duration>` as milliseconds
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.map(|d| d.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
