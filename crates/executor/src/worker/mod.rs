//! Worker pool for batch execution
//!
//! This module provides:
//! - [`WorkerPool`] - One task per batch, joined at a single barrier
//! - [`RetryEngine`] - Per-command attempt state machine run inside a worker
//! - [`WorkerResult`] / [`WorkerFailure`] - What a worker hands back at the join
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkerPool                             │
//! │  ┌─────────────┐  ┌─────────────┐       ┌─────────────┐     │
//! │  │  Worker 0   │  │  Worker 1   │  ...  │ Worker W-1  │     │
//! │  │  Batch 0    │  │  Batch 1    │       │ Batch W-1   │     │
//! │  │ RetryEngine │  │ RetryEngine │       │ RetryEngine │     │
//! │  └──────┬──────┘  └──────┬──────┘       └──────┬──────┘     │
//! │         │ AttemptRecord  │                     │            │
//! │         ▼                ▼                     ▼            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │          FailureRecorder (single collector)         │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  join barrier: every handle awaited, panics surfaced         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod engine;
mod pool;

pub use engine::{CommandOutcome, RetryEngine};
pub use pool::{PoolOutcome, WorkerFailure, WorkerPool, WorkerResult};
