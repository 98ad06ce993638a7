//! Halo exchange between ring neighbours, and the generation step built on it.
//!
//! A worker's first row travels to its predecessor, which stores it as its
//! lower ghost row; its last row travels to its successor, which stores it as
//! its upper ghost row. Horizontal wrap is purely local.

use std::fmt;

use tracing::debug;

use crate::comm::{Communicator, TAG_LOWER_BOUND, TAG_UPPER_BOUND};
use crate::error::TransferError;
use crate::grid::{Grid, HaloRows};
use crate::partition::Ring;
use crate::stencil::Stencil;

/// How boundary transfers are ordered against computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Discipline {
    /// Paired send/receive per direction, then compute every row.
    Blocking,
    /// Compute and send the edge rows first, compute the interior while they
    /// are in flight, and wait only before the buffer swap.
    Overlapped,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Blocking => write!(f, "blocking"),
            Discipline::Overlapped => write!(f, "overlapped"),
        }
    }
}

pub struct BoundaryExchanger<'c, C: Communicator> {
    comm: &'c C,
    ring: Ring,
    stencil: Stencil,
}

impl<'c, C: Communicator> BoundaryExchanger<'c, C> {
    pub fn new(comm: &'c C, stencil: Stencil) -> Self {
        BoundaryExchanger {
            comm,
            ring: Ring::new(comm.rank(), comm.size()),
            stencil,
        }
    }

    /// Fill both ghost rows of `grid` from the neighbours with two paired
    /// transfers. Returns once both have completed.
    pub fn exchange_blocking(&self, grid: &mut Grid) -> Result<(), TransferError> {
        let predecessor = self.ring.predecessor();
        let successor = self.ring.successor();

        let HaloRows {
            upper_ghost,
            first,
            last,
            lower_ghost,
            ..
        } = grid.halo_rows();
        let first: &[u8] = first;
        // A single-row worker sends the same row both ways.
        let last: &[u8] = match last {
            Some(last) => last,
            None => first,
        };

        // Upward: our first row to the predecessor, the successor's first
        // row into our lower ghost row.
        self.comm.send_receive(
            first,
            predecessor,
            TAG_UPPER_BOUND,
            lower_ghost,
            successor,
            TAG_UPPER_BOUND,
        )?;
        // Downward: our last row to the successor, the predecessor's last
        // row into our upper ghost row.
        self.comm.send_receive(
            last,
            successor,
            TAG_LOWER_BOUND,
            upper_ghost,
            predecessor,
            TAG_LOWER_BOUND,
        )
    }

    /// One generation with the blocking discipline. `from` gets fresh ghost
    /// rows and columns; `to` receives the next generation.
    pub fn step_blocking(&self, from: &mut Grid, to: &mut Grid) -> Result<(), TransferError> {
        self.exchange_blocking(from)?;
        from.wrap_columns();

        let rows = from.rows();
        self.stencil.step_rows(from, to, 1, rows);
        Ok(())
    }

    /// One generation with the overlapped discipline.
    ///
    /// `from` must already hold the ghost rows for this generation, either from
    /// the initial blocking exchange or from the previous overlapped step. The
    /// ghost rows for the next generation are received straight into `to`.
    pub fn step_overlapped(&self, from: &mut Grid, to: &mut Grid) -> Result<(), TransferError> {
        from.wrap_columns();

        let src: &Grid = from;
        let rows = src.rows();
        let stencil = self.stencil;
        debug!(rank = self.ring.rank, rows, "overlapped step");

        self.comm.overlapped_exchange(
            self.ring,
            to.halo_rows(),
            &mut |first, last| {
                stencil.compute_rows(src, first, 1);
                if let Some(last) = last {
                    stencil.compute_rows(src, last, rows);
                }
            },
            &mut |middle| {
                if !middle.is_empty() {
                    stencil.compute_rows(src, middle, 2);
                }
            },
        )
    }

    pub fn step(&self, discipline: Discipline, from: &mut Grid, to: &mut Grid) -> Result<(), TransferError> {
        match discipline {
            Discipline::Blocking => self.step_blocking(from, to),
            Discipline::Overlapped => self.step_overlapped(from, to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::local::LocalCluster;
    use crate::grid::Cell;
    use std::thread;

    fn numbered_grid(rows: usize, width: usize, tag: u8) -> Grid {
        let mut grid = Grid::new(rows, width);
        for y in 1..=rows {
            for x in 1..=width {
                grid.set(y, x, tag * 16 + y as u8);
            }
        }
        grid
    }

    #[test]
    fn test_single_worker_wraps_vertically() {
        let comm = LocalCluster::new(1).pop().unwrap();
        let exchanger = BoundaryExchanger::new(&comm, Stencil::default());

        let mut grid = numbered_grid(3, 4, 0);
        exchanger.exchange_blocking(&mut grid).unwrap();

        assert_eq!(grid.line(0), grid.line(3));
        assert_eq!(grid.line(4), grid.line(1));
    }

    #[test]
    fn test_ring_of_three_exchanges_with_neighbours() {
        let endpoints = LocalCluster::new(3);
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank() as u8;
                    let exchanger = BoundaryExchanger::new(&comm, Stencil::default());
                    let mut grid = numbered_grid(2, 3, rank);
                    exchanger.exchange_blocking(&mut grid).unwrap();
                    grid
                })
            })
            .collect();
        let grids: Vec<Grid> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for rank in 0..3 {
            let predecessor = (rank + 2) % 3;
            let successor = (rank + 1) % 3;
            let upper: Vec<Cell> = grids[rank].interior(0).to_vec();
            let lower: Vec<Cell> = grids[rank].interior(3).to_vec();
            assert_eq!(&upper[..], grids[predecessor].interior(2), "rank {}", rank);
            assert_eq!(&lower[..], grids[successor].interior(1), "rank {}", rank);
        }
    }

    #[test]
    fn test_single_row_worker_sends_same_row_both_ways() {
        let endpoints = LocalCluster::new(2);
        let handles: Vec<_> = endpoints
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let rank = comm.rank() as u8;
                    let exchanger = BoundaryExchanger::new(&comm, Stencil::default());
                    let mut grid = numbered_grid(1, 3, rank);
                    exchanger.exchange_blocking(&mut grid).unwrap();
                    grid
                })
            })
            .collect();
        let grids: Vec<Grid> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(grids[0].interior(0), grids[1].interior(1));
        assert_eq!(grids[0].interior(2), grids[1].interior(1));
        assert_eq!(grids[1].interior(0), grids[0].interior(1));
        assert_eq!(grids[1].interior(2), grids[0].interior(1));
    }

    #[test]
    fn test_disciplines_agree_for_one_worker() {
        let mut seed = crate::random::RandomField::new(3);
        let mut initial = Grid::new(6, 8);
        initial.fill_random(&mut seed);

        let comm = LocalCluster::new(1).pop().unwrap();
        let exchanger = BoundaryExchanger::new(&comm, Stencil::default());

        let mut blocking = [initial.clone(), Grid::new(6, 8)];
        let mut overlapped = [initial, Grid::new(6, 8)];
        exchanger.exchange_blocking(&mut overlapped[0]).unwrap();

        for _ in 0..5 {
            let (from, to) = blocking.split_at_mut(1);
            exchanger.step_blocking(&mut from[0], &mut to[0]).unwrap();
            blocking.swap(0, 1);

            let (from, to) = overlapped.split_at_mut(1);
            exchanger.step_overlapped(&mut from[0], &mut to[0]).unwrap();
            overlapped.swap(0, 1);
        }

        for y in 1..=6 {
            assert_eq!(blocking[0].interior(y), overlapped[0].interior(y), "row {}", y);
        }
    }

    #[test]
    fn test_discipline_display() {
        assert_eq!(Discipline::Blocking.to_string(), "blocking");
        assert_eq!(Discipline::Overlapped.to_string(), "overlapped");
    }
}
