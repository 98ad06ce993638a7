//! Row decomposition of the global grid across a ring of workers.

use crate::error::ConfigError;

/// How `total_rows` rows are split over `workers` workers.
///
/// The first `remainder_workers` ranks get one extra row each, so the row
/// count of rank 0 is always the largest one any rank holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decomposition {
    pub total_rows: usize,
    pub workers: usize,
    pub remainder_workers: usize,
}

/// The slice of global rows owned by one worker. Fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub rank: usize,
    pub rows: usize,
    pub offset: usize,
}

impl Decomposition {
    pub fn new(total_rows: usize, workers: usize) -> Result<Self, ConfigError> {
        if workers < 1 {
            return Err(ConfigError::NoWorkers);
        }
        if total_rows < workers {
            return Err(ConfigError::TooFewRows {
                rows: total_rows,
                workers,
            });
        }
        Ok(Decomposition {
            total_rows,
            workers,
            remainder_workers: total_rows % workers,
        })
    }

    /// Row count held by `rank`.
    pub fn rows_of(&self, rank: usize) -> usize {
        let base = self.total_rows / self.workers;
        if rank < self.remainder_workers {
            base + 1
        } else {
            base
        }
    }

    /// The largest row count any rank holds (the one rank 0 holds).
    pub fn max_rows(&self) -> usize {
        self.rows_of(0)
    }

    pub fn partition(&self, rank: usize) -> Result<Partition, ConfigError> {
        if rank >= self.workers {
            return Err(ConfigError::RankOutOfRange {
                rank,
                workers: self.workers,
            });
        }
        let base = self.total_rows / self.workers;
        let offset = rank * base + rank.min(self.remainder_workers);
        Ok(Partition {
            rank,
            rows: self.rows_of(rank),
            offset,
        })
    }
}

/// Ring neighbours of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ring {
    pub rank: usize,
    pub size: usize,
}

impl Ring {
    pub fn new(rank: usize, size: usize) -> Self {
        Ring { rank, size }
    }

    /// The worker holding the rows just above ours (wrapping to the last rank).
    pub fn predecessor(&self) -> usize {
        (self.rank + self.size - 1) % self.size
    }

    /// The worker holding the rows just below ours (wrapping to rank 0).
    pub fn successor(&self) -> usize {
        (self.rank + 1) % self.size
    }
}
