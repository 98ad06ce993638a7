//! Gathering the final rows at the coordinator and folding them into one MD5.

use std::fmt;

use md5::{Digest, Md5};
use tracing::{debug, info};

use crate::comm::{check_size, Communicator, TAG_RESULT};
use crate::error::TransferError;
use crate::grid::{clear_ghost_columns, Grid};
use crate::partition::Decomposition;

pub const COORDINATOR: usize = 0;

pub type DigestBytes = [u8; 16];

/// What the coordinator prints at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Report {
    pub digest: DigestBytes,
    /// Simulation seconds of the slowest worker.
    pub elapsed: f64,
}

impl Report {
    /// 32 uppercase hex digits.
    pub fn digest_hex(&self) -> String {
        hex::encode_upper(self.digest)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hash: {}\ttime: {:.3} s", self.digest_hex(), self.elapsed)
    }
}

/// Digest of a grid's local rows with the ghost columns zeroed, as the
/// coordinator would compute it for a single worker.
pub fn digest_grid(grid: &Grid) -> DigestBytes {
    let mut lines = grid.local_lines().to_vec();
    clear_ghost_columns(&mut lines, grid.width());
    let mut hasher = Md5::new();
    hasher.update(&lines);
    hasher.finalize().into()
}

/// Collect every worker's final rows at the coordinator in rank order.
///
/// The coordinator hashes its own rows in place, then receives every other
/// rank's rows into one buffer sized for the largest row count any rank
/// holds. The reported time is the slowest worker's. Returns the report on
/// the coordinator and `None` everywhere else.
pub fn reduce<C: Communicator>(
    comm: &C,
    decomposition: &Decomposition,
    mut grid: Grid,
    elapsed: f64,
) -> Result<Option<Report>, TransferError> {
    grid.clear_ghost_columns();

    if comm.rank() != COORDINATOR {
        debug!(rank = comm.rank(), rows = grid.rows(), "sending result rows");
        comm.send(COORDINATOR, TAG_RESULT, grid.local_lines())?;
        comm.reduce_max(COORDINATOR, elapsed)?;
        return Ok(None);
    }

    let width = grid.width();
    let stride = grid.stride();
    let mut hasher = Md5::new();
    hasher.update(grid.local_lines());

    let mut buffer = vec![0; decomposition.max_rows() * stride];
    for rank in 1..comm.size() {
        let expected = decomposition.rows_of(rank) * stride;
        let received = comm.receive_into(rank, TAG_RESULT, &mut buffer)?;
        check_size(COORDINATOR, rank, TAG_RESULT, expected, received)?;

        let lines = &mut buffer[..expected];
        clear_ghost_columns(lines, width);
        hasher.update(&*lines);
        debug!(rank, bytes = expected, "folded result rows");
    }

    let slowest = comm.reduce_max(COORDINATOR, elapsed)?.unwrap_or(elapsed);

    let report = Report {
        digest: hasher.finalize().into(),
        elapsed: slowest,
    };
    info!(digest = %report.digest_hex(), elapsed = report.elapsed, "reduction complete");
    Ok(Some(report))
}
