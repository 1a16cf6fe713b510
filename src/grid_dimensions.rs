use std::fmt;

use crate::cells::Cartesian2DCoordinate;
use crate::errors::*;
use crate::units::{ColumnLength, RowLength};

/// Size of a rectangular maze grid.
///
/// Cells are addressed row-major: index `y * length + x`, which is also the layout of every
/// buffer the engine fills.
#[derive(Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub struct GridDimensions {
    row_width: RowLength,
    column_height: ColumnLength,
}

impl GridDimensions {
    pub fn new(row_width: RowLength, column_height: ColumnLength) -> Result<GridDimensions> {
        if row_width.0 == 0 || column_height.0 == 0 ||
           row_width.0.checked_mul(column_height.0).is_none() ||
           row_width.0 > u32::MAX as usize || column_height.0 > u32::MAX as usize {
            bail!(ErrorKind::InvalidDimensions(row_width.0, column_height.0));
        }
        Ok(GridDimensions { row_width, column_height })
    }

    /// Extent along x.
    #[inline(always)]
    pub fn length(&self) -> usize {
        self.row_width.0
    }

    /// Extent along y.
    #[inline(always)]
    pub fn width(&self) -> usize {
        self.column_height.0
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.row_width.0 * self.column_height.0
    }

    pub fn diagonal(&self) -> f32 {
        let (l, w) = (self.length() as f32, self.width() as f32);
        (l * l + w * w).sqrt()
    }

    #[inline]
    pub fn contains(&self, coord: Cartesian2DCoordinate) -> bool {
        (coord.x as usize) < self.length() && (coord.y as usize) < self.width()
    }

    /// Row-major index of a coordinate, `None` if it lies outside the grid.
    #[inline]
    pub fn index_of(&self, coord: Cartesian2DCoordinate) -> Option<usize> {
        if self.contains(coord) {
            Some(coord.y as usize * self.length() + coord.x as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn coordinate_at(&self, index: usize) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate::new((index % self.length()) as u32, (index / self.length()) as u32)
    }

    /// Clamp a coordinate into the grid.
    pub fn clamp(&self, coord: Cartesian2DCoordinate) -> Cartesian2DCoordinate {
        Cartesian2DCoordinate::new(coord.x.min(self.length() as u32 - 1),
                                   coord.y.min(self.width() as u32 - 1))
    }

    /// All coordinates in row-major order.
    pub fn iter(&self) -> CoordinateIter {
        CoordinateIter {
            dimensions: *self,
            next_index: 0,
        }
    }
}

impl fmt::Display for GridDimensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.length(), self.width())
    }
}

#[derive(Debug, Clone)]
pub struct CoordinateIter {
    dimensions: GridDimensions,
    next_index: usize,
}

impl Iterator for CoordinateIter {
    type Item = Cartesian2DCoordinate;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index < self.dimensions.size() {
            let coord = self.dimensions.coordinate_at(self.next_index);
            self.next_index += 1;
            Some(coord)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dimensions.size() - self.next_index;
        (remaining, Some(remaining))
    }
}
impl ExactSizeIterator for CoordinateIter {} // default impl using size_hint()

#[cfg(test)]
mod tests {

    use super::*;

    fn dims(l: usize, w: usize) -> GridDimensions {
        GridDimensions::new(RowLength(l), ColumnLength(w)).expect("valid dimensions")
    }

    #[test]
    fn zero_sized_grids_are_rejected() {
        assert!(GridDimensions::new(RowLength(0), ColumnLength(4)).is_err());
        assert!(GridDimensions::new(RowLength(4), ColumnLength(0)).is_err());
    }

    #[test]
    fn grid_coordinate_as_index() {
        let g = dims(3, 2);
        let gc = |x, y| Cartesian2DCoordinate::new(x, y);
        let indices: Vec<Option<usize>> = [gc(0, 0), gc(1, 0), gc(2, 0), gc(0, 1), gc(1, 1), gc(2, 1)]
            .iter()
            .map(|coord| g.index_of(*coord))
            .collect();
        let expected = (0..6).map(Some).collect::<Vec<Option<usize>>>();
        assert_eq!(expected, indices);

        assert_eq!(g.index_of(gc(3, 0)), None);
        assert_eq!(g.index_of(gc(0, 2)), None);
        assert_eq!(g.index_of(gc(u32::MAX, u32::MAX)), None);
    }

    #[test]
    fn index_and_coordinate_agree() {
        let g = dims(7, 5);
        for (i, coord) in g.iter().enumerate() {
            assert_eq!(g.index_of(coord), Some(i));
            assert_eq!(g.coordinate_at(i), coord);
        }
        assert_eq!(g.iter().len(), 35);
    }

    #[test]
    fn clamping_keeps_coordinates_inside() {
        let g = dims(4, 6);
        assert_eq!(g.clamp(Cartesian2DCoordinate::new(10, 10)), Cartesian2DCoordinate::new(3, 5));
        assert_eq!(g.clamp(Cartesian2DCoordinate::new(1, 2)), Cartesian2DCoordinate::new(1, 2));
    }
}
