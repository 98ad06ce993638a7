//! Ring workers as threads of one process, wired with crossbeam channels.
//!
//! Every (source, destination, tag) triple gets its own unbounded channel, so
//! sends never block and receives match on source and tag exactly like MPI
//! point-to-point matching. Endpoints are moved into their worker threads and
//! share nothing else.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::trace;

use super::{
    Communicator, EdgeKernel, InteriorKernel, Tag, ALL_TAGS, TAG_LOWER_BOUND, TAG_TIMING,
    TAG_UPPER_BOUND,
};
use crate::error::TransferError;
use crate::grid::HaloRows;
use crate::partition::Ring;

pub struct LocalComm {
    rank: usize,
    size: usize,
    outboxes: HashMap<(usize, Tag), Sender<Vec<u8>>>,
    inboxes: HashMap<(usize, Tag), Receiver<Vec<u8>>>,
}

pub struct LocalCluster;

impl LocalCluster {
    /// One endpoint per rank, indexed by rank.
    pub fn new(size: usize) -> Vec<LocalComm> {
        let mut endpoints: Vec<LocalComm> = (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                outboxes: HashMap::new(),
                inboxes: HashMap::new(),
            })
            .collect();

        for source in 0..size {
            for dest in 0..size {
                for &tag in ALL_TAGS.iter() {
                    let (sender, receiver) = unbounded();
                    endpoints[source].outboxes.insert((dest, tag), sender);
                    endpoints[dest].inboxes.insert((source, tag), receiver);
                }
            }
        }
        endpoints
    }
}

impl LocalComm {
    fn outbox(&self, dest: usize, tag: Tag) -> Result<&Sender<Vec<u8>>, TransferError> {
        self.outboxes.get(&(dest, tag)).ok_or(TransferError::NoRoute {
            rank: self.rank,
            peer: dest,
            tag,
        })
    }

    fn inbox(&self, source: usize, tag: Tag) -> Result<&Receiver<Vec<u8>>, TransferError> {
        self.inboxes.get(&(source, tag)).ok_or(TransferError::NoRoute {
            rank: self.rank,
            peer: source,
            tag,
        })
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, tag: Tag, buf: &[u8]) -> Result<(), TransferError> {
        trace!(dest, tag, bytes = buf.len(), "send");
        self.outbox(dest, tag)?
            .send(buf.to_vec())
            .map_err(|_| TransferError::Disconnected {
                rank: self.rank,
                peer: dest,
                tag,
            })
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [u8]) -> Result<usize, TransferError> {
        let message = self
            .inbox(source, tag)?
            .recv()
            .map_err(|_| TransferError::Disconnected {
                rank: self.rank,
                peer: source,
                tag,
            })?;
        if message.len() > buf.len() {
            return Err(TransferError::SizeMismatch {
                rank: self.rank,
                peer: source,
                tag,
                expected: buf.len(),
                actual: message.len(),
            });
        }
        buf[..message.len()].copy_from_slice(&message);
        trace!(source, tag, bytes = message.len(), "receive");
        Ok(message.len())
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
        // Sends are buffered, so issuing the send first cannot deadlock.
        self.send(dest, send_tag, send)?;
        self.receive_exact(source, recv_tag, recv)
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

        // There is nothing to pre-post: the inbox channels exist for the whole
        // run and hold whatever a neighbour sends until it is collected below.
        let HaloRows {
            upper_ghost,
            first,
            middle,
            mut last,
            lower_ghost,
        } = halo;

        // The edge rows go first, since they are the only rows a neighbour
        // waits for.
        edges(&mut *first, last.as_deref_mut());
        let first: &[u8] = first;
        // A single-row worker sends its one row in both directions.
        let last: &[u8] = match last {
            Some(last) => last,
            None => first,
        };
        // Our first row becomes the predecessor's lower ghost row, our last
        // row the successor's upper ghost row. Channel sends never block.
        self.send(predecessor, TAG_UPPER_BOUND, first)?;
        self.send(successor, TAG_LOWER_BOUND, last)?;

        // The interior depends on nothing in flight.
        interior(middle);

        // Wait for the neighbours' edge rows only now, right before the
        // caller swaps buffers.
        self.receive_exact(predecessor, TAG_LOWER_BOUND, upper_ghost)?;
        self.receive_exact(successor, TAG_UPPER_BOUND, lower_ghost)
    }

    fn reduce_max(&self, root: usize, value: f64) -> Result<Option<f64>, TransferError> {
        // A plain gather at `root`: 8 little-endian bytes from every other rank.
        if self.rank != root {
            self.send(root, TAG_TIMING, &value.to_le_bytes())?;
            return Ok(None);
        }
        let mut max = value;
        for rank in (0..self.size).filter(|&rank| rank != root) {
            let mut bytes = [0u8; 8];
            self.receive_exact(rank, TAG_TIMING, &mut bytes)?;
            max = max.max(f64::from_le_bytes(bytes));
        }
        Ok(Some(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::TAG_RESULT;
    use std::thread;

    #[test]
    fn test_roundtrip_two_ranks() {
        let mut endpoints = LocalCluster::new(2);
        let comm1 = endpoints.pop().unwrap();
        let comm0 = endpoints.pop().unwrap();

        let receiver = thread::spawn(move || {
            let mut buf = [0u8; 4];
            let received = comm1.receive_into(0, TAG_UPPER_BOUND, &mut buf).unwrap();
            (received, buf)
        });
        comm0.send(1, TAG_UPPER_BOUND, &[1, 2, 3, 4]).unwrap();

        let (received, buf) = receiver.join().unwrap();
        assert_eq!(received, 4);
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn test_tags_do_not_mix() {
        let comm = LocalCluster::new(1).pop().unwrap();
        comm.send(0, TAG_LOWER_BOUND, &[2]).unwrap();
        comm.send(0, TAG_UPPER_BOUND, &[1]).unwrap();

        let mut buf = [0u8; 1];
        comm.receive_exact(0, TAG_UPPER_BOUND, &mut buf).unwrap();
        assert_eq!(buf, [1]);
        comm.receive_exact(0, TAG_LOWER_BOUND, &mut buf).unwrap();
        assert_eq!(buf, [2]);
    }

    #[test]
    fn test_size_mismatch_is_reported() {
        let comm = LocalCluster::new(1).pop().unwrap();
        comm.send(0, TAG_UPPER_BOUND, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 4];
        let err = comm.receive_exact(0, TAG_UPPER_BOUND, &mut buf).unwrap_err();
        assert_eq!(
            err,
            TransferError::SizeMismatch {
                rank: 0,
                peer: 0,
                tag: TAG_UPPER_BOUND,
                expected: 4,
                actual: 3,
            }
        );

        comm.send(0, TAG_UPPER_BOUND, &[0; 8]).unwrap();
        assert!(matches!(
            comm.receive_into(0, TAG_UPPER_BOUND, &mut buf),
            Err(TransferError::SizeMismatch { actual: 8, .. })
        ));
    }

    #[test]
    fn test_reduce_max_reaches_root_only() {
        let handles: Vec<_> = LocalCluster::new(3)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let value = [1.5, 4.0, 2.5][comm.rank()];
                    comm.reduce_max(1, value).unwrap()
                })
            })
            .collect();
        let results: Vec<Option<f64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![None, Some(4.0), None]);
    }

    #[test]
    fn test_departed_peer_disconnects() {
        let mut endpoints = LocalCluster::new(2);
        let comm1 = endpoints.pop().unwrap();
        drop(endpoints);

        let mut buf = [0u8; 1];
        assert_eq!(
            comm1.receive_into(0, TAG_RESULT, &mut buf),
            Err(TransferError::Disconnected {
                rank: 1,
                peer: 0,
                tag: TAG_RESULT,
            })
        );
    }

    #[test]
    fn test_unknown_peer() {
        let comm = LocalCluster::new(2).pop().unwrap();
        assert_eq!(
            comm.send(5, TAG_UPPER_BOUND, &[0]),
            Err(TransferError::NoRoute {
                rank: 1,
                peer: 5,
                tag: TAG_UPPER_BOUND,
            })
        );
    }
}
