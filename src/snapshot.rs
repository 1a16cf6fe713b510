use std::ops::Index;

use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::errors::*;
use crate::grid_dimensions::GridDimensions;

/// One immutable copy of the full engine grid taken at a poll instant.
///
/// Every snapshot owns its cells, queue entries never alias the producer's scratch buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    dimensions: GridDimensions,
    cells: Box<[CellCode]>,
}

impl Snapshot {
    /// Copy `cells` into a new snapshot, rejecting buffers that do not cover the grid exactly.
    pub fn capture(dimensions: GridDimensions, cells: &[CellCode]) -> Result<Snapshot> {
        Snapshot::from_cells(dimensions, cells.to_vec())
    }

    pub fn from_cells(dimensions: GridDimensions, cells: Vec<CellCode>) -> Result<Snapshot> {
        if cells.len() != dimensions.size() {
            bail!(ErrorKind::MalformedSnapshot(dimensions.size(), cells.len()));
        }
        Ok(Snapshot {
            dimensions,
            cells: cells.into_boxed_slice(),
        })
    }

    #[inline]
    pub fn dimensions(&self) -> GridDimensions {
        self.dimensions
    }

    #[inline]
    pub fn cells(&self) -> &[CellCode] {
        &self.cells
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, coord: Cartesian2DCoordinate) -> Option<CellCode> {
        self.dimensions.index_of(coord).map(|i| self.cells[i])
    }

    pub fn count(&self, code: CellCode) -> usize {
        count_cells(&self.cells, code)
    }
}

impl Index<usize> for Snapshot {
    type Output = CellCode;

    fn index(&self, index: usize) -> &CellCode {
        &self.cells[index]
    }
}

/// How a polled buffer looks through the eyes of one stream kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Classification {
    pub interesting: usize,
    pub valid: bool,
}

/// Count the cells a stream tracks; a buffer is only worth queueing if it has some and is not
/// all `Empty` (the engine's "nothing to report" state).
pub fn classify(cells: &[CellCode], interesting: CellCode) -> Classification {
    let count = count_cells(cells, interesting);
    let any_set = cells.iter().any(|c| *c != CellCode::Empty);
    Classification {
        interesting: count,
        valid: count > 0 && any_set,
    }
}

#[inline]
pub fn count_cells(cells: &[CellCode], code: CellCode) -> usize {
    cells.iter().filter(|c| **c == code).count()
}
