//! Point-to-point transport between ring workers.
//!
//! Messages are raw, fixed-size byte buffers matched by source rank and tag.
//! `local` wires workers running as threads of one process; `mpi_world`
//! (feature `mpi`) puts one worker in each MPI process.

use crate::error::TransferError;
use crate::grid::{Cell, HaloRows};
use crate::partition::Ring;

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi_world;

pub type Tag = i32;

/// A worker's first row, travelling to its predecessor.
pub const TAG_UPPER_BOUND: Tag = 1;
/// A worker's last row, travelling to its successor.
pub const TAG_LOWER_BOUND: Tag = 2;
/// Final local rows, travelling to the coordinator.
pub const TAG_RESULT: Tag = 0xCAFE;
/// Elapsed simulation seconds, travelling to the coordinator.
pub const TAG_TIMING: Tag = 0xCAFF;

pub const ALL_TAGS: [Tag; 4] = [TAG_UPPER_BOUND, TAG_LOWER_BOUND, TAG_RESULT, TAG_TIMING];

/// Fills the first and (when distinct) last local row of the next generation.
pub type EdgeKernel<'k> = dyn FnMut(&mut [Cell], Option<&mut [Cell]>) + 'k;
/// Fills the rows between the first and the last.
pub type InteriorKernel<'k> = dyn FnMut(&mut [Cell]) + 'k;

pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn send(&self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransferError>;

    /// Blocking receive. Returns how many bytes of `buf` were filled.
    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<usize, TransferError>;

    /// Combined send and receive that completes only when both have.
    fn send_receive(
        &self,
        send: &[u8],
        dest: usize,
        send_tag: Tag,
        recv: &mut [u8],
        source: usize,
        recv_tag: Tag,
    ) -> Result<(), TransferError>;

    /// One overlapped halo step on the next-generation buffer `halo`:
    /// post receives for both ghost rows, run `edges`, send the two edge rows
    /// to the ring neighbours, run `interior` while those transfers are in
    /// flight, then wait for all four transfers.
    fn overlapped_exchange(
        &self,
        ring: Ring,
        halo: HaloRows<'_>,
        edges: &mut EdgeKernel<'_>,
        interior: &mut InteriorKernel<'_>,
    ) -> Result<(), TransferError>;

    /// Maximum of every rank's `value`, delivered to `root` only. Every rank
    /// of the ring must call it.
    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, TransferError>;

    /// Receive that must fill `buf` exactly.
    fn receive_exact(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<(), TransferError> {
        let received = self.receive_into(source, tag, buf)?;
        check_size(self.rank(), source, tag, buf.len(), received)
    }
}

pub(crate) fn check_size(
    rank: usize,
    peer: usize,
    tag: Tag,
    expected: usize,
    actual: usize,
) -> Result<(), TransferError> {
    if expected == actual {
        Ok(())
    } else {
        Err(TransferError::SizeMismatch {
            rank,
            peer,
            tag,
            expected,
            actual,
        })
    }
}
