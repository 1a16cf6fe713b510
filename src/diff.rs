use crate::cells::{Cartesian2DCoordinate, CellCode};
use crate::grid::LogicalGrid;
use crate::grid_dimensions::GridDimensions;

/// Cells that became interesting and cells that stopped being interesting between two grids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridDiff {
    pub created: Vec<Cartesian2DCoordinate>,
    pub removed: Vec<Cartesian2DCoordinate>,
}

impl GridDiff {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.removed.len()
    }

    /// Mark created cells `interesting` and clear removed ones.
    pub fn apply(&self, grid: &mut LogicalGrid, interesting: CellCode) {
        for coord in &self.removed {
            grid.set(*coord, CellCode::Empty);
        }
        for coord in &self.created {
            grid.set(*coord, interesting);
        }
    }
}

/// Symmetric difference of the `interesting` cells of two equally sized row-major grids.
///
/// Panics if the grids differ in length from each other or from `dimensions`.
pub fn diff_grids(dimensions: GridDimensions,
                  previous: &[CellCode],
                  next: &[CellCode],
                  interesting: CellCode)
                  -> GridDiff {
    assert_eq!(previous.len(), dimensions.size());
    assert_eq!(next.len(), dimensions.size());

    let mut diff = GridDiff::default();
    for (index, (before, after)) in previous.iter().zip(next.iter()).enumerate() {
        match (*before == interesting, *after == interesting) {
            (false, true) => diff.created.push(dimensions.coordinate_at(index)),
            (true, false) => diff.removed.push(dimensions.coordinate_at(index)),
            _ => {}
        }
    }
    diff
}
