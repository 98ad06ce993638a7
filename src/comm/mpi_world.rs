//! One ring worker per MPI process, over `MPI_COMM_WORLD`.

use mpi::collective::{Root, SystemOperation};
use mpi::datatype::Equivalence;
use mpi::environment::Universe;
use mpi::point_to_point::{self as p2p, Destination, Source, Status};
use mpi::topology::{Communicator as MpiCommunicator, SystemCommunicator};

use super::{
    check_size, Communicator, EdgeKernel, InteriorKernel, Tag, TAG_LOWER_BOUND, TAG_UPPER_BOUND,
};
use crate::error::TransferError;
use crate::grid::HaloRows;
use crate::partition::Ring;

pub struct MpiComm {
    world: SystemCommunicator,
    rank: usize,
    size: usize,
    // Finalizes MPI when dropped, so it must outlive every use of `world`.
    _universe: Universe,
}

impl MpiComm {
    /// Initialize MPI. `None` if it was already initialized.
    pub fn init() -> Option<Self> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        Some(MpiComm {
            world,
            rank: world.rank() as usize,
            size: world.size() as usize,
            _universe: universe,
        })
    }

    /// Tear down every process of the job.
    pub fn abort(&self, code: i32) -> ! {
        self.world.abort(code)
    }

    fn byte_count(status: &Status) -> usize {
        status.count(u8::equivalent_datatype()) as usize
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransferError> {
        self.world.process_at_rank(dest as i32).send_with_tag(buf, tag);
        Ok(())
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<usize, TransferError> {
        let status = self
            .world
            .process_at_rank(source as i32)
            .receive_into_with_tag(buf, tag);
        Ok(Self::byte_count(&status))
    }

    fn send_receive(
        &self,
        send: &[u8],
        dest: usize,
        send_tag: Tag,
        recv: &mut [u8],
        source: usize,
        recv_tag: Tag,
    ) -> Result<(), TransferError> {
        let expected = recv.len();
        // Send and receive in one call, so two neighbours sending to each
        // other at the same time cannot deadlock.
        let status = p2p::send_receive_into_with_tags(
            send,
            &self.world.process_at_rank(dest as i32),
            send_tag,
            recv,
            &self.world.process_at_rank(source as i32),
            recv_tag,
        );
        check_size(self.rank, source, recv_tag, expected, Self::byte_count(&status))
    }

    fn overlapped_exchange(
        &self,
        ring: Ring,
        halo: HaloRows<'_>,
        edges: &mut EdgeKernel<'_>,
        interior: &mut InteriorKernel<'_>,
    ) -> Result<(), TransferError> {
        let predecessor = ring.predecessor();
        let successor = ring.successor();
        let prev = self.world.process_at_rank(predecessor as i32);
        let succ = self.world.process_at_rank(successor as i32);

        let HaloRows {
            upper_ghost,
            first,
            middle,
            mut last,
            lower_ghost,
        } = halo;
        let line = first.len();

        // Every immediate request below borrows a buffer for the lifetime of
        // the scope, and the scope refuses to end while any request is still
        // outstanding, so no buffer can be touched while MPI owns it.
        let (upper_status, lower_status) = mpi::request::scope(|scope| {
            // Pre-post the receives so an early sender never waits on us.
            // The predecessor's last row lands in our upper ghost row, the
            // successor's first row in our lower ghost row.
            let recv_upper = prev.immediate_receive_into_with_tag(scope, upper_ghost, TAG_LOWER_BOUND);
            let recv_lower = succ.immediate_receive_into_with_tag(scope, lower_ghost, TAG_UPPER_BOUND);

            // The edge rows are what the neighbours wait for, so compute them
            // first and get them on the wire.
            edges(&mut *first, last.as_deref_mut());
            let first: &[u8] = first;
            // A single-row worker sends its one row in both directions.
            let last: &[u8] = match last {
                Some(last) => last,
                None => first,
            };
            let send_upper = prev.immediate_send_with_tag(scope, first, TAG_UPPER_BOUND);
            let send_lower = succ.immediate_send_with_tag(scope, last, TAG_LOWER_BOUND);

            // The interior reads only the source grid, so it runs while the
            // four transfers are in flight.
            interior(middle);

            // Block only now, before the caller swaps buffers. wait() hands
            // back the status, which carries the received byte count.
            let upper_status = recv_upper.wait();
            let lower_status = recv_lower.wait();
            send_upper.wait_without_status();
            send_lower.wait_without_status();
            (upper_status, lower_status)
        });

        check_size(self.rank, predecessor, TAG_LOWER_BOUND, line, Self::byte_count(&upper_status))?;
        check_size(self.rank, successor, TAG_UPPER_BOUND, line, Self::byte_count(&lower_status))
    }

    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, TransferError> {
        let root_process = self.world.process_at_rank(root as i32);
        // The maximum is computed by MPI itself. Only the root receives it,
        // every other rank just contributes its value.
        if self.rank == root {
            let mut max = 0.0f64;
            root_process.reduce_into_root(&value, &mut max, SystemOperation::max());
            Ok(Some(max))
        } else {
            root_process.reduce_into(&value, SystemOperation::max());
            Ok(None)
        }
    }
}
