//! The annealing rule and the row kernel that applies it.

use rayon::prelude::*;

use crate::grid::{Cell, Grid};

/// Annealing rule (Chopard & Droz 1996, p. 34): number of live cells in the
/// 3x3 neighbourhood, centre included, mapped to the next state.
pub const ANNEAL: [Cell; 10] = [0, 0, 0, 0, 1, 0, 1, 1, 1, 1];

/// Next state for a neighbourhood sum in `0..=9`.
#[inline]
pub fn transition(neighbourhood_sum: usize) -> Cell {
    ANNEAL[neighbourhood_sum]
}

/// Sum of the 3x3 block around column `x` of three adjacent lines.
#[inline]
fn neighbourhood_sum(above: &[Cell], centre: &[Cell], below: &[Cell], x: usize) -> usize {
    let column = |line: &[Cell]| (line[x - 1] + line[x] + line[x + 1]) as usize;
    column(above) + column(centre) + column(below)
}

/// Write the next state of one line. `dst` is a whole line, ghost columns
/// included; only columns `1..=width` are written.
fn compute_line(src: &Grid, y: usize, dst: &mut [Cell]) {
    let above = src.line(y - 1);
    let centre = src.line(y);
    let below = src.line(y + 1);
    for x in 1..=src.width() {
        dst[x] = transition(neighbourhood_sum(above, centre, below, x));
    }
}

/// Applies the rule to ranges of lines, optionally fanning lines out over the
/// rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stencil {
    pub parallel: bool,
}

impl Stencil {
    pub fn new(parallel: bool) -> Self {
        Stencil { parallel }
    }

    /// Compute lines `start_row..start_row + n` of the next generation into
    /// `dst`, which holds exactly those `n` whole lines. Reads `src` only,
    /// so calls on disjoint destination ranges may run at the same time.
    pub fn compute_rows(&self, src: &Grid, dst: &mut [Cell], start_row: usize) {
        let stride = src.stride();
        debug_assert_eq!(dst.len() % stride, 0);
        debug_assert!(start_row >= 1 && start_row + dst.len() / stride <= src.rows() + 1);

        if self.parallel {
            dst.par_chunks_mut(stride)
                .enumerate()
                .for_each(|(i, line)| compute_line(src, start_row + i, line));
        } else {
            for (i, line) in dst.chunks_mut(stride).enumerate() {
                compute_line(src, start_row + i, line);
            }
        }
    }

    /// Compute `count` lines starting at `start_row` from `src` into the same
    /// lines of `dst`.
    pub fn step_rows(&self, src: &Grid, dst: &mut Grid, start_row: usize, count: usize) {
        self.compute_rows(src, dst.lines_mut(start_row, count), start_row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_table() {
        let alive: Vec<usize> = (0..=9).filter(|&sum| transition(sum) == 1).collect();
        assert_eq!(alive, vec![4, 6, 7, 8, 9]);
        for sum in [0, 1, 2, 3, 5].iter() {
            assert_eq!(transition(*sum), 0, "sum {}", sum);
        }
    }

    #[test]
    fn test_centre_cell_counts_towards_sum() {
        // Centre plus three neighbours is a sum of 4, which lives.
        let mut src = Grid::new(3, 3);
        src.set(2, 2, 1);
        src.set(1, 1, 1);
        src.set(1, 2, 1);
        src.set(1, 3, 1);
        let mut dst = Grid::new(3, 3);
        Stencil::default().step_rows(&src, &mut dst, 2, 1);
        assert_eq!(dst.get(2, 2), 1);

        // Same three neighbours without the centre is a sum of 3, which dies.
        src.set(2, 2, 0);
        Stencil::default().step_rows(&src, &mut dst, 2, 1);
        assert_eq!(dst.get(2, 2), 0);
    }

    #[test]
    fn test_every_sum_through_kernel() {
        let positions = [(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3), (3, 1), (3, 2), (3, 3)];
        for sum in 0..=9 {
            let mut src = Grid::new(3, 3);
            for &(y, x) in positions.iter().take(sum) {
                src.set(y, x, 1);
            }
            let mut dst = Grid::new(3, 3);
            Stencil::default().step_rows(&src, &mut dst, 2, 1);
            assert_eq!(dst.get(2, 2), ANNEAL[sum], "sum {}", sum);
        }
    }

    #[test]
    fn test_source_is_untouched_and_ghosts_not_written() {
        let mut src = Grid::new(4, 5);
        for y in 0..6 {
            for x in 0..7 {
                src.set(y, x, ((x + y) % 2) as Cell);
            }
        }
        let before = src.clone();
        let mut dst = Grid::new(4, 5);
        Stencil::default().step_rows(&src, &mut dst, 1, 4);

        assert_eq!(src, before);
        for y in 0..6 {
            assert_eq!(dst.get(y, 0), 0);
            assert_eq!(dst.get(y, 6), 0);
        }
        assert!(dst.line(0).iter().all(|&c| c == 0));
        assert!(dst.line(5).iter().all(|&c| c == 0));
    }

    #[test]
    fn test_parallel_matches_serial() {
        let mut src = Grid::new(40, 33);
        src.fill_random(&mut crate::random::RandomField::new(99));
        src.wrap_columns();

        let mut serial = Grid::new(40, 33);
        let mut parallel = Grid::new(40, 33);
        Stencil::new(false).step_rows(&src, &mut serial, 1, 40);
        Stencil::new(true).step_rows(&src, &mut parallel, 1, 40);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_split_ranges_match_whole_range() {
        let mut src = Grid::new(9, 12);
        src.fill_random(&mut crate::random::RandomField::new(5));
        src.wrap_columns();

        let stencil = Stencil::default();
        let mut whole = Grid::new(9, 12);
        stencil.step_rows(&src, &mut whole, 1, 9);

        let mut pieces = Grid::new(9, 12);
        stencil.step_rows(&src, &mut pieces, 1, 1);
        stencil.step_rows(&src, &mut pieces, 9, 1);
        stencil.step_rows(&src, &mut pieces, 2, 7);
        assert_eq!(whole, pieces);
    }
}
