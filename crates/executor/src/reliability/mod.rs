//! Reliability patterns for command execution
//!
//! This module provides:
//! - [`RetryPolicy`] - Bounded attempts with a fixed delay between them
//! - [`TimeoutConfig`] - Per-attempt execution timeout

pub(crate) mod retry;
mod timeout;

pub use retry::RetryPolicy;
pub use timeout::{TimeoutConfig, DEFAULT_COMMAND_TIMEOUT};
