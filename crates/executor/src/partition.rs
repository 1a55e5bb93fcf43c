//! Batch partitioning policies
//!
//! Splits N commands into contiguous, non-empty batches, one per worker.
//! There is no work stealing: a batch is fixed at partition time and owned by
//! exactly one worker for the whole run.

use std::ops::Range;

use crate::command::CommandUnit;

/// Ordered, contiguous slice of the input owned by one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Worker that owns this batch
    pub worker_id: usize,
    /// Position of the batch within the input
    pub range: Range<usize>,
    pub commands: Vec<CommandUnit>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Strategy for laying out N commands over a worker budget
///
/// Implementations must return contiguous ranges that cover `0..n` exactly,
/// contain no empty range, and number at most `workers`.
pub trait PartitionPolicy: Send + Sync {
    /// Compute batch ranges for `n` commands and `workers` workers (both ≥ 1)
    fn ranges(&self, n: usize, workers: usize) -> Vec<Range<usize>>;

    /// Split owned commands into batches following [`Self::ranges`]
    fn partition(&self, commands: Vec<CommandUnit>, workers: usize) -> Vec<Batch> {
        let ranges = self.ranges(commands.len(), workers.max(1));
        let mut remaining = commands.into_iter();

        ranges
            .into_iter()
            .enumerate()
            .map(|(worker_id, range)| Batch {
                worker_id,
                commands: remaining.by_ref().take(range.len()).collect(),
                range,
            })
            .collect()
    }
}

/// `min(N, W)` batches whose sizes differ by at most one
///
/// Earlier batches take the remainder, e.g. 5 commands over 2 workers gives
/// 3 + 2.
#[derive(Debug, Clone, Copy, Default)]
pub struct BalancedPartitioner;

impl PartitionPolicy for BalancedPartitioner {
    fn ranges(&self, n: usize, workers: usize) -> Vec<Range<usize>> {
        if n == 0 {
            return Vec::new();
        }
        let count = n.min(workers.max(1));
        let base = n / count;
        let extra = n % count;

        let mut start = 0;
        (0..count)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let range = start..start + len;
                start += len;
                range
            })
            .collect()
    }
}

/// Fixed chunk size `max(1, ceil(N / W))`, last batch possibly shorter
///
/// May produce fewer than `min(N, W)` batches, e.g. 10 commands over 6
/// workers gives five batches of two.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkedPartitioner;

impl ChunkedPartitioner {
    pub fn batch_size(n: usize, workers: usize) -> usize {
        n.div_ceil(workers.max(1)).max(1)
    }
}

impl PartitionPolicy for ChunkedPartitioner {
    fn ranges(&self, n: usize, workers: usize) -> Vec<Range<usize>> {
        let size = Self::batch_size(n, workers);
        (0..n)
            .step_by(size)
            .map(|start| start..(start + size).min(n))
            .collect()
    }
}
