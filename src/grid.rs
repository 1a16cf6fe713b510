use std::fmt;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::grid_dimensions::GridDimensions;
use crate::snapshot::{self, Snapshot};

/// The consumer's view of the grid: the state of the most recent fully applied snapshot.
///
/// Owned by whoever ticks the consumer (the owning thread); a producer never writes here.
#[derive(Clone, PartialEq, Eq)]
pub struct LogicalGrid {
    dimensions: GridDimensions,
    cells: Vec<CellCode>,
}

impl LogicalGrid {
    pub fn new(dimensions: GridDimensions) -> LogicalGrid {
        LogicalGrid {
            dimensions,
            cells: vec![CellCode::Empty; dimensions.size()],
        }
    }

    pub fn from_snapshot(snapshot: &Snapshot) -> LogicalGrid {
        LogicalGrid {
            dimensions: snapshot.dimensions(),
            cells: snapshot.cells().to_vec(),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    #[inline]
    pub fn cells(&self) -> &[CellCode] {
        &self.cells
    }

    pub fn get(&self, coord: Cartesian2DCoordinate) -> Option<CellCode> {
        self.dimensions.index_of(coord).map(|i| self.cells[i])
    }

    /// Set one cell, returns false if the coordinate is outside the grid.
    pub fn set(&mut self, coord: Cartesian2DCoordinate, code: CellCode) -> bool {
        if let Some(i) = self.dimensions.index_of(coord) {
            self.cells[i] = code;
            true
        } else {
            false
        }
    }

    /// Replace the whole state with a snapshot of the same dimensions.
    ///
    /// Panics if the dimensions differ, callers filter mismatched snapshots first.
    pub fn replace_with(&mut self, snapshot: &Snapshot) {
        assert_eq!(self.dimensions, snapshot.dimensions(), "snapshot for a different grid");
        self.cells.copy_from_slice(snapshot.cells());
    }

    pub fn count(&self, code: CellCode) -> usize {
        snapshot::count_cells(&self.cells, code)
    }

    /// Walkable means inside the grid and not a wall.
    pub fn is_walkable(&self, coord: Cartesian2DCoordinate) -> bool {
        self.get(coord).map_or(false, |code| code != CellCode::Wall)
    }

    pub fn walkable_cells(&self) -> Vec<Cartesian2DCoordinate> {
        self.dimensions
            .iter()
            .filter(|coord| self.is_walkable(*coord))
            .collect()
    }
}

impl fmt::Debug for LogicalGrid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LogicalGrid :: {}, walls: {}, open: {}",
               self.dimensions, self.count(CellCode::Wall), self.count(CellCode::Open))
    }
}

impl fmt::Display for LogicalGrid {
    /// One glyph per cell: `#` wall, `.` open/visited, space empty.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.cells.chunks(self.dimensions.length()) {
            let line: String = row.iter()
                .map(|code| match *code {
                    CellCode::Wall => '#',
                    CellCode::Open => '.',
                    CellCode::Empty => ' ',
                })
                .collect();
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::units::{ColumnLength, RowLength};

    fn dims(l: usize, w: usize) -> GridDimensions {
        GridDimensions::new(RowLength(l), ColumnLength(w)).unwrap()
    }

    #[test]
    fn new_grids_are_empty() {
        let g = LogicalGrid::new(dims(4, 3));
        assert_eq!(g.cells().len(), 12);
        assert_eq!(g.count(CellCode::Empty), 12);
    }

    #[test]
    fn walls_are_not_walkable() {
        let mut g = LogicalGrid::new(dims(3, 3));
        let gc = |x, y| Cartesian2DCoordinate::new(x, y);
        assert!(g.set(gc(1, 1), CellCode::Wall));
        assert!(!g.set(gc(3, 1), CellCode::Wall));
        assert!(!g.is_walkable(gc(1, 1)));
        assert!(g.is_walkable(gc(0, 1)));
        assert!(!g.is_walkable(gc(5, 5)));
        assert_eq!(g.walkable_cells().len(), 8);
    }

    #[test]
    fn text_rendering() {
        let mut g = LogicalGrid::new(dims(3, 2));
        g.set(Cartesian2DCoordinate::new(0, 0), CellCode::Wall);
        g.set(Cartesian2DCoordinate::new(2, 1), CellCode::Open);
        assert_eq!(format!("{}", g), "#  \n  .\n");
    }

    #[test]
    fn replacing_copies_the_snapshot() {
        let d = dims(2, 2);
        let snapshot = Snapshot::capture(d, &[CellCode::Wall, CellCode::Empty, CellCode::Open, CellCode::Wall])
            .unwrap();
        let mut g = LogicalGrid::new(d);
        g.replace_with(&snapshot);
        assert_eq!(g, LogicalGrid::from_snapshot(&snapshot));
        assert_eq!(g.count(CellCode::Wall), 2);
    }
}
