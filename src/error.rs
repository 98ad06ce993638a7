//! Error types for the simulation.
//!
//! Every variant is fatal: a worker that hits one stops, and the binary exits
//! non-zero without printing a digest.

use crate::comm::Tag;

/// Invalid run parameters, detected before any worker starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("total row count must be > 0")]
    NoRows,

    #[error("grid width must be > 0")]
    NoColumns,

    #[error("worker count must be > 0")]
    NoWorkers,

    /// Every worker needs at least one row of its own.
    #[error("total row count {rows} is smaller than the worker count {workers}")]
    TooFewRows { rows: usize, workers: usize },

    #[error("worker rank {rank} is outside a ring of {workers} workers")]
    RankOutOfRange { rank: usize, workers: usize },

    #[error("transport `{0}` is not available in this build")]
    TransportUnavailable(String),
}

/// A point-to-point transfer went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The peer sent a different number of bytes than the protocol expects.
    #[error(
        "rank {rank}: transfer from rank {peer} (tag {tag:#x}) carried {actual} bytes, expected {expected}"
    )]
    SizeMismatch {
        rank: usize,
        peer: usize,
        tag: Tag,
        expected: usize,
        actual: usize,
    },

    #[error("rank {rank}: rank {peer} left the ring before its transfer (tag {tag:#x}) completed")]
    Disconnected { rank: usize, peer: usize, tag: Tag },

    #[error("rank {rank}: no route to rank {peer} for tag {tag:#x}")]
    NoRoute { rank: usize, peer: usize, tag: Tag },
}

/// Anything that can stop a run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: usize },

    #[error("could not start a worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SimError {
    /// A peer vanished mid-transfer, usually because it failed first.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SimError::Transfer(TransferError::Disconnected { .. }))
    }
}

pub type Result<T, E = SimError> = std::result::Result<T, E>;
