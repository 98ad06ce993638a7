//! Row-padded cell buffer owned by one worker.
//!
//! Layout is `rows + 2` lines of `width + 2` bytes. Line 0 and line
//! `rows + 1` are ghost rows filled from the ring neighbours; column 0 and
//! column `width + 1` of every line are ghost columns filled by the torus wrap.

use crate::random::RandomField;

pub type Cell = u8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    rows: usize,
    cells: Vec<Cell>,
}

/// Disjoint mutable views of the lines that take part in a halo exchange.
///
/// With a single local row, `first` is also the last row and `last` is `None`.
#[derive(Debug)]
pub struct HaloRows<'a> {
    pub upper_ghost: &'a mut [Cell],
    pub first: &'a mut [Cell],
    pub middle: &'a mut [Cell],
    pub last: Option<&'a mut [Cell]>,
    pub lower_ghost: &'a mut [Cell],
}

impl Grid {
    pub fn new(rows: usize, width: usize) -> Self {
        Grid {
            width,
            rows,
            cells: vec![0; (rows + 2) * (width + 2)],
        }
    }

    /// Logical columns, ghost columns excluded.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Local rows, ghost rows excluded.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Bytes per line, ghost columns included.
    pub fn stride(&self) -> usize {
        self.width + 2
    }

    pub fn line(&self, y: usize) -> &[Cell] {
        let stride = self.stride();
        &self.cells[y * stride..(y + 1) * stride]
    }

    pub fn line_mut(&mut self, y: usize) -> &mut [Cell] {
        let stride = self.stride();
        &mut self.cells[y * stride..(y + 1) * stride]
    }

    /// The `width` live cells of line `y`, without ghost columns.
    pub fn interior(&self, y: usize) -> &[Cell] {
        &self.line(y)[1..=self.width]
    }

    pub fn get(&self, y: usize, x: usize) -> Cell {
        self.cells[y * self.stride() + x]
    }

    pub fn set(&mut self, y: usize, x: usize, value: Cell) {
        let stride = self.stride();
        self.cells[y * stride + x] = value;
    }

    /// Lines `start..start + count` as one contiguous slice.
    pub fn lines(&self, start: usize, count: usize) -> &[Cell] {
        let stride = self.stride();
        &self.cells[start * stride..(start + count) * stride]
    }

    pub fn lines_mut(&mut self, start: usize, count: usize) -> &mut [Cell] {
        let stride = self.stride();
        &mut self.cells[start * stride..(start + count) * stride]
    }

    /// Lines `1..=rows`, the part of the buffer this worker owns.
    pub fn local_lines(&self) -> &[Cell] {
        self.lines(1, self.rows)
    }

    pub fn local_lines_mut(&mut self) -> &mut [Cell] {
        let rows = self.rows;
        self.lines_mut(1, rows)
    }

    /// Torus wrap: column 0 copies column `width`, column `width + 1` copies
    /// column 1, on every line including the ghost rows.
    pub fn wrap_columns(&mut self) {
        let width = self.width;
        for line in self.cells.chunks_exact_mut(width + 2) {
            line[0] = line[width];
            line[width + 1] = line[1];
        }
    }

    /// Zero both ghost columns of the local rows so they never reach a digest.
    pub fn clear_ghost_columns(&mut self) {
        let width = self.width;
        clear_ghost_columns(self.local_lines_mut(), width);
    }

    /// Fill the local rows from `field`, row-major over the live columns.
    pub fn fill_random(&mut self, field: &mut RandomField) {
        let width = self.width;
        for line in self.local_lines_mut().chunks_exact_mut(width + 2) {
            for cell in &mut line[1..=width] {
                *cell = field.next_bool() as Cell;
            }
        }
    }

    pub fn halo_rows(&mut self) -> HaloRows<'_> {
        let stride = self.stride();
        let rows = self.rows;

        let (upper_ghost, rest) = self.cells.split_at_mut(stride);
        let (first, rest) = rest.split_at_mut(stride);
        let (middle, last, lower_ghost) = if rows == 1 {
            let (middle, lower_ghost) = rest.split_at_mut(0);
            (middle, None, lower_ghost)
        } else {
            let (middle, rest) = rest.split_at_mut((rows - 2) * stride);
            let (last, lower_ghost) = rest.split_at_mut(stride);
            (middle, Some(last), lower_ghost)
        };
        HaloRows {
            upper_ghost,
            first,
            middle,
            last,
            lower_ghost,
        }
    }
}

/// Zero the ghost columns of a run of whole lines.
pub fn clear_ghost_columns(lines: &mut [Cell], width: usize) {
    for line in lines.chunks_exact_mut(width + 2) {
        line[0] = 0;
        line[width + 1] = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterned(rows: usize, width: usize) -> Grid {
        let mut grid = Grid::new(rows, width);
        for y in 0..rows + 2 {
            for x in 0..width + 2 {
                grid.set(y, x, ((y * 7 + x * 3) % 5 == 0) as Cell);
            }
        }
        grid
    }

    #[test]
    fn test_dimensions() {
        let grid = Grid::new(3, 8);
        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.width(), 8);
        assert_eq!(grid.stride(), 10);
        assert_eq!(grid.local_lines().len(), 30);
        assert_eq!(grid.interior(1).len(), 8);
    }

    #[test]
    fn test_wrap_columns() {
        let mut grid = patterned(4, 6);
        grid.wrap_columns();
        for y in 0..6 {
            assert_eq!(grid.get(y, 0), grid.get(y, 6), "line {}", y);
            assert_eq!(grid.get(y, 7), grid.get(y, 1), "line {}", y);
        }
    }

    #[test]
    fn test_clear_ghost_columns_keeps_ghost_rows() {
        let mut grid = Grid::new(2, 4);
        for y in 0..4 {
            for x in 0..6 {
                grid.set(y, x, 1);
            }
        }
        grid.clear_ghost_columns();

        for y in 1..=2 {
            assert_eq!(grid.get(y, 0), 0);
            assert_eq!(grid.get(y, 5), 0);
            assert!(grid.interior(y).iter().all(|&c| c == 1));
        }
        assert_eq!(grid.get(0, 0), 1);
        assert_eq!(grid.get(3, 5), 1);
    }

    #[test]
    fn test_halo_rows_split() {
        let mut grid = patterned(5, 4);
        let expected_first = grid.line(1).to_vec();
        let expected_last = grid.line(5).to_vec();

        let halo = grid.halo_rows();
        assert_eq!(halo.upper_ghost.len(), 6);
        assert_eq!(halo.first, &expected_first[..]);
        assert_eq!(halo.middle.len(), 3 * 6);
        assert_eq!(halo.last.as_deref(), Some(&expected_last[..]));
        assert_eq!(halo.lower_ghost.len(), 6);
    }

    #[test]
    fn test_halo_rows_single_row() {
        let mut grid = patterned(1, 4);
        let expected = grid.line(1).to_vec();

        let halo = grid.halo_rows();
        assert!(halo.middle.is_empty());
        assert!(halo.last.is_none());
        assert_eq!(halo.first, &expected[..]);
        assert_eq!(halo.lower_ghost.len(), 6);
    }

    #[test]
    fn test_fill_random_leaves_padding_zero() {
        let mut grid = Grid::new(3, 16);
        grid.fill_random(&mut RandomField::new(1));
        for y in 0..5 {
            assert_eq!(grid.get(y, 0), 0);
            assert_eq!(grid.get(y, 17), 0);
        }
        assert!(grid.line(0).iter().all(|&c| c == 0));
        assert!(grid.line(4).iter().all(|&c| c == 0));
        assert!(grid.local_lines().iter().any(|&c| c == 1));
    }
}
